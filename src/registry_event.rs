/// Events emitted by the registry during operations.
///
/// These events are passed to the tracing callback set via
/// [`SingletonRegistry::set_trace_callback`](crate::SingletonRegistry::set_trace_callback).
/// Keys are rendered with their `Debug` implementation.
///
/// # Examples
///
/// ```rust
/// use singleton_pool::RegistryEvent;
///
/// let event = RegistryEvent::Publish {
///     key: "\"db\"".to_string(),
///     type_name: "u32",
/// };
/// assert_eq!(event.to_string(), "publish { key: \"db\", type_name: u32 }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// The calling thread won the race and is about to run the factory.
    Construct {
        key: String,
        type_name: &'static str,
    },

    /// The factory succeeded and the instance is now visible to every caller.
    Publish {
        key: String,
        type_name: &'static str,
    },

    /// The factory failed; the key is absent again.
    ConstructionFailed { key: String },

    /// The calling thread blocked because another thread is constructing the key.
    Wait { key: String },

    /// A factory asked for the key it is constructing.
    Reentered { key: String },

    /// A lookup without construction was performed.
    Get { key: String, found: bool },

    /// A key existence check was performed.
    Contains { key: String, found: bool },
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::Construct { key, type_name } => {
                write!(f, "construct {{ key: {}, type_name: {} }}", key, type_name)
            }
            RegistryEvent::Publish { key, type_name } => {
                write!(f, "publish {{ key: {}, type_name: {} }}", key, type_name)
            }
            RegistryEvent::ConstructionFailed { key } => {
                write!(f, "construction_failed {{ key: {} }}", key)
            }
            RegistryEvent::Wait { key } => write!(f, "wait {{ key: {} }}", key),
            RegistryEvent::Reentered { key } => write!(f, "reentered {{ key: {} }}", key),
            RegistryEvent::Get { key, found } => {
                write!(f, "get {{ key: {}, found: {} }}", key, found)
            }
            RegistryEvent::Contains { key, found } => {
                write!(f, "contains {{ key: {}, found: {} }}", key, found)
            }
        }
    }
}
