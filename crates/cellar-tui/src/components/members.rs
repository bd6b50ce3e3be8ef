use crate::engine::{Component, StyledLine};
use crate::theme;
use crate::utils::fit;

/// Sidebar listing the members of the active channel, role prefix included.
#[derive(Debug, Default)]
pub struct MemberList {
    members: Vec<String>,
    height: usize,
}

impl MemberList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_members(&mut self, members: Vec<String>) {
        self.members = members;
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height;
    }
}

impl Component for MemberList {
    fn render(&self, width: usize) -> Vec<StyledLine> {
        let mut lines = vec![fit(
            &theme::fg(theme::MUTED, &format!(" {} users", self.members.len())),
            width,
        )];

        let room = self.height.saturating_sub(1);
        let overflow = self.members.len() > room;
        let shown = if overflow { room.saturating_sub(1) } else { room };

        for member in self.members.iter().take(shown) {
            let color = match member.chars().next() {
                Some('~' | '@') => theme::SUCCESS,
                Some('%' | '+') => theme::ACCENT,
                _ => theme::TEXT,
            };
            lines.push(fit(&theme::fg(color, &format!(" {member}")), width));
        }
        if overflow && room > 0 {
            let more = self.members.len() - shown;
            lines.push(fit(&theme::fg(theme::DIM, &format!(" +{more} more")), width));
        }
        lines.truncate(self.height.max(1));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::visible_width;

    #[test]
    fn lists_members_under_count() {
        let mut list = MemberList::new();
        list.set_height(10);
        list.set_members(vec!["@op".into(), "bob".into()]);
        let lines = list.render(12);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("2 users"));
        assert!(lines[1].contains("@op"));
        assert!(lines.iter().all(|l| visible_width(l) == 12));
    }

    #[test]
    fn overflow_is_summarised() {
        let mut list = MemberList::new();
        list.set_height(4);
        list.set_members((0..10).map(|i| format!("user{i}")).collect());
        let lines = list.render(16);
        assert_eq!(lines.len(), 4);
        assert!(lines[3].contains("+8 more"));
    }
}
