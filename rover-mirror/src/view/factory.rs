use super::node_view::{NamingConvention, NodeView};
use crate::node::NodeRecord;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Builds the view for records of one node type
pub trait ViewFactory {
    fn create_view(&self, record: Rc<NodeRecord>, naming: &NamingConvention) -> NodeView;
}

/// Plain projection with no type-specific behavior
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultViewFactory;

impl ViewFactory for DefaultViewFactory {
    fn create_view(&self, record: Rc<NodeRecord>, naming: &NamingConvention) -> NodeView {
        NodeView::from_record(record, naming)
    }
}

impl<F> ViewFactory for F
where
    F: Fn(Rc<NodeRecord>, &NamingConvention) -> NodeView,
{
    fn create_view(&self, record: Rc<NodeRecord>, naming: &NamingConvention) -> NodeView {
        self(record, naming)
    }
}

/// Node type → view factory table, fixed once the mirror is built
pub struct ViewFactoryRegistry {
    by_type: HashMap<String, Rc<dyn ViewFactory>>,
    fallback: Rc<dyn ViewFactory>,
}

impl ViewFactoryRegistry {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            fallback: Rc::new(DefaultViewFactory),
        }
    }

    pub fn register(mut self, node_type: &str, factory: impl ViewFactory + 'static) -> Self {
        self.by_type.insert(node_type.to_string(), Rc::new(factory));
        self
    }

    pub fn with_fallback(mut self, factory: impl ViewFactory + 'static) -> Self {
        self.fallback = Rc::new(factory);
        self
    }

    pub fn resolve(&self, node_type: &str) -> &dyn ViewFactory {
        self.by_type
            .get(node_type)
            .map(|f| f.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    pub fn build(&self, record: Rc<NodeRecord>, naming: &NamingConvention) -> NodeView {
        let factory = self.resolve(record.node_type.as_str());
        factory.create_view(record, naming)
    }
}

impl Default for ViewFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ViewFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ViewFactoryRegistry")
            .field("types", &types)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeSpec, Tag};

    fn naming() -> NamingConvention {
        NamingConvention::new("nativeID", "__native::")
    }

    #[test]
    fn test_unregistered_type_uses_fallback() {
        let registry = ViewFactoryRegistry::new();
        let record = Rc::new(NodeSpec::new(Tag(1), "View").into_record());

        let view = registry.build(record, &naming());
        assert!(view.hints().is_empty());
    }

    #[test]
    fn test_registered_factory_is_used_for_its_type() {
        let registry = ViewFactoryRegistry::new().register(
            "TextInput",
            |record: Rc<NodeRecord>, naming: &NamingConvention| {
                let mut view = NodeView::from_record(record, naming);
                view.add_hint("focusable");
                view
            },
        );

        let input = Rc::new(NodeSpec::new(Tag(1), "TextInput").into_record());
        let plain = Rc::new(NodeSpec::new(Tag(2), "View").into_record());

        assert!(registry.build(input, &naming()).has_hint("focusable"));
        assert!(!registry.build(plain, &naming()).has_hint("focusable"));
    }
}
