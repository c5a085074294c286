/// Events emitted by a [`System`](crate::System) during operations.
///
/// These events are passed to the tracing callback set via `set_trace_callback`.
/// The `Clone` derive allows callbacks to store or forward events if needed.
///
/// # Examples
///
/// ```rust
/// use service_registry::RegistryEvent;
///
/// let event = RegistryEvent::Register { name: "db".into(), accepted: true };
/// assert_eq!(event.to_string(), "register { name: db, accepted: true }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A registration went through the pipeline.
    Register {
        /// The service name
        name: String,
        /// Whether the value was written to the registry
        accepted: bool,
    },

    /// A service was requested.
    Get {
        /// The service name
        name: String,
        /// Whether a value was handed out
        found: bool,
    },

    /// A service was removed.
    Unregister {
        /// The service name
        name: String,
        /// Whether a value was present
        found: bool,
    },
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::Register { name, accepted } => {
                write!(f, "register {{ name: {}, accepted: {} }}", name, accepted)
            }
            RegistryEvent::Get { name, found } => {
                write!(f, "get {{ name: {}, found: {} }}", name, found)
            }
            RegistryEvent::Unregister { name, found } => {
                write!(f, "unregister {{ name: {}, found: {} }}", name, found)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_event_display() {
        let event = RegistryEvent::Get {
            name: "cache".into(),
            found: false,
        };
        assert_eq!(event.to_string(), "get { name: cache, found: false }");

        let event = RegistryEvent::Unregister {
            name: "cache".into(),
            found: true,
        };
        assert_eq!(event.to_string(), "unregister { name: cache, found: true }");
    }

    #[test]
    fn test_registry_event_clone() {
        let event = RegistryEvent::Register {
            name: "db".into(),
            accepted: false,
        };
        assert_eq!(event.clone(), event);
    }
}
