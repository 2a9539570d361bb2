//! Components and Elements
//!
//! The host UI framework is a black box to Komposer. All the container needs
//! to know about a component is how to name it, which static fields it
//! carries, and how to describe "render this component with these props".
//!
//! # Renderables
//!
//! A [`Renderable`] is anything that can appear in a render output:
//!
//! - a function component (a render closure with an optional name),
//! - a class component (a type implementing [`ComponentClass`]; containers
//!   themselves are class components, which is what makes them stack),
//! - a primitive host tag such as `"p"`.
//!
//! Display names resolve in order: explicit `display_name` static, the
//! structural name (function or type name), then `"ChildComponent"`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::props::{PropValue, Props};

/// Fallback display name for components that have none.
pub const FALLBACK_NAME: &str = "ChildComponent";

/// Render closure of a function component.
pub type RenderFn = Arc<dyn Fn(&Props) -> Element + Send + Sync>;

/// Static metadata attached to a component type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statics {
    display_name: Option<String>,
    fields: Props,
}

impl Statics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn fields(&self) -> &Props {
        &self.fields
    }

    /// Statics for a wrapper of `self`: caller-attached fields are copied,
    /// the display name is replaced.
    pub fn hoisted(&self, display_name: impl Into<String>) -> Statics {
        Statics {
            display_name: Some(display_name.into()),
            fields: self.fields.clone(),
        }
    }
}

/// A component implemented as a type.
pub trait ComponentClass: Send + Sync + 'static {
    /// The structural name of the type, if it has one.
    fn type_name(&self) -> Option<&str> {
        None
    }

    fn statics(&self) -> &Statics;

    fn as_any(&self) -> &dyn Any;
}

/// A function component.
#[derive(Clone)]
pub struct FunctionComponent {
    name: Option<String>,
    render: RenderFn,
    statics: Statics,
}

impl FunctionComponent {
    pub fn render(&self, props: &Props) -> Element {
        (self.render)(props)
    }
}

/// Anything that can be rendered.
#[derive(Clone)]
pub enum Renderable {
    Function(FunctionComponent),
    Class(Arc<dyn ComponentClass>),
    Primitive(String),
}

impl Renderable {
    /// A named function component.
    pub fn function<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&Props) -> Element + Send + Sync + 'static,
    {
        Self::Function(FunctionComponent {
            name: Some(name.into()),
            render: Arc::new(render),
            statics: Statics::default(),
        })
    }

    /// A function component without a name.
    pub fn anonymous<F>(render: F) -> Self
    where
        F: Fn(&Props) -> Element + Send + Sync + 'static,
    {
        Self::Function(FunctionComponent {
            name: None,
            render: Arc::new(render),
            statics: Statics::default(),
        })
    }

    pub fn class<C: ComponentClass>(class: C) -> Self {
        Self::Class(Arc::new(class))
    }

    pub fn primitive(tag: impl Into<String>) -> Self {
        Self::Primitive(tag.into())
    }

    /// Replace the statics of a function component. Other kinds own their
    /// statics and are returned unchanged.
    pub fn with_statics(self, statics: Statics) -> Self {
        match self {
            Self::Function(mut function) => {
                function.statics = statics;
                Self::Function(function)
            }
            other => other,
        }
    }

    pub fn statics(&self) -> Statics {
        match self {
            Self::Function(function) => function.statics.clone(),
            Self::Class(class) => class.statics().clone(),
            Self::Primitive(_) => Statics::default(),
        }
    }

    fn structural_name(&self) -> Option<&str> {
        match self {
            Self::Function(function) => function.name.as_deref(),
            Self::Class(class) => class.type_name(),
            Self::Primitive(_) => None,
        }
    }

    pub fn display_name(&self) -> String {
        let explicit = match self {
            Self::Function(function) => function.statics.display_name(),
            Self::Class(class) => class.statics().display_name(),
            Self::Primitive(_) => None,
        };
        explicit
            .or_else(|| self.structural_name())
            .unwrap_or(FALLBACK_NAME)
            .to_owned()
    }

    /// Downcast a class component.
    pub fn downcast_class<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Class(class) => class.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Whether both values refer to the same component.
    pub fn ptr_eq(&self, other: &Renderable) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => {
                Arc::as_ptr(&a.render) as *const () == Arc::as_ptr(&b.render) as *const ()
            }
            (Self::Class(a), Self::Class(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Function(_) => "Function",
            Self::Class(_) => "Class",
            Self::Primitive(_) => "Primitive",
        };
        f.debug_tuple(kind).field(&self.display_name()).finish()
    }
}

/// The committed child of a container, as seen through its ref.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildInstance {
    name: String,
    props: Props,
}

impl ChildInstance {
    pub fn new(name: impl Into<String>, props: Props) -> Self {
        Self {
            name: name.into(),
            props,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn props(&self) -> &Props {
        &self.props
    }
}

/// Slot the host fills with the live child instance.
#[derive(Clone, Default)]
pub struct ChildRef(Arc<Mutex<Option<ChildInstance>>>);

impl ChildRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, child: ChildInstance) {
        *self.0.lock() = Some(child);
    }

    pub fn detach(&self) {
        self.0.lock().take();
    }

    pub fn get(&self) -> Option<ChildInstance> {
        self.0.lock().clone()
    }

    pub fn ptr_eq(&self, other: &ChildRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ChildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChildRef").field(&self.get()).finish()
    }
}

/// A description of UI output.
#[derive(Debug, Clone)]
pub enum Element {
    /// Render nothing.
    Empty,
    Text(String),
    /// A host tag with children.
    Tag {
        name: String,
        children: Vec<Element>,
    },
    /// A component rendered with props, optionally capturing its instance.
    Component {
        component: Renderable,
        props: Props,
        child_ref: Option<ChildRef>,
    },
}

impl Element {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A host tag, e.g. `<p>loading</p>`.
    pub fn tag(name: impl Into<String>, children: Vec<Element>) -> Self {
        Self::Tag {
            name: name.into(),
            children,
        }
    }

    pub fn component(component: Renderable, props: Props) -> Self {
        Self::Component {
            component,
            props,
            child_ref: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Props of a component element.
    pub fn props(&self) -> Option<&Props> {
        match self {
            Self::Component { props, .. } => Some(props),
            _ => None,
        }
    }

    /// Expand function components and print the result as markup.
    ///
    /// Class components print as `<Name />`.
    pub fn to_markup(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(text) => text.clone(),
            Self::Tag { name, children } => {
                let inner: String = children.iter().map(Element::to_markup).collect();
                format!("<{name}>{inner}</{name}>")
            }
            Self::Component {
                component, props, ..
            } => match component {
                Renderable::Function(function) => function.render(props).to_markup(),
                Renderable::Class(_) => format!("<{} />", component.display_name()),
                Renderable::Primitive(tag) => format!("<{tag} />"),
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
