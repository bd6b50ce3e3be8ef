/// Last-rendered copy of one view's source data.
///
/// The UI loop owns one of these per view. Each tick it pulls the live value
/// and re-renders only when it differs from what was rendered last.
#[derive(Debug, Clone, Default)]
pub struct Reconciled<T> {
    rendered: Option<T>,
}

impl<T: Clone + PartialEq> Reconciled<T> {
    pub fn new() -> Self {
        Self { rendered: None }
    }

    /// Compare `live()` against the cached value; on difference call
    /// `render` and keep the new value. Returns whether it rendered.
    pub fn sync(&mut self, live: impl FnOnce() -> T, render: impl FnOnce(&T)) -> bool {
        let current = live();
        if self.rendered.as_ref() == Some(&current) {
            return false;
        }
        render(&current);
        self.rendered = Some(current);
        true
    }

    pub fn rendered(&self) -> Option<&T> {
        self.rendered.as_ref()
    }

    /// Forget the cached value so the next `sync` renders unconditionally.
    pub fn invalidate(&mut self) {
        self.rendered = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_only_on_change() {
        let mut view = Reconciled::new();
        let mut renders = Vec::new();

        for value in [1, 1, 2, 2, 2, 3, 1] {
            view.sync(|| value, |v| renders.push(*v));
        }

        assert_eq!(renders, vec![1, 2, 3, 1]);
        assert_eq!(view.rendered(), Some(&1));
    }

    #[test]
    fn first_sync_always_renders() {
        let mut view: Reconciled<Vec<String>> = Reconciled::new();
        assert!(view.sync(Vec::new, |_| {}));
        assert!(!view.sync(Vec::new, |_| {}));
    }

    #[test]
    fn invalidate_forces_render() {
        let mut view = Reconciled::new();
        view.sync(|| "a", |_| {});
        view.invalidate();
        let mut rendered = false;
        view.sync(|| "a", |_| rendered = true);
        assert!(rendered);
    }
}
