use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Observability hooks delegated to the shell. Fire-and-forget: the core
/// never blocks on telemetry and never observes its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TelemetryOperation {
    Counter {
        name: String,
        value: u64,
    },
    Event {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Error {
        operation: String,
        message: String,
    },
}

impl Operation for TelemetryOperation {
    type Output = ();
}

pub struct Telemetry<Ev> {
    context: CapabilityContext<TelemetryOperation, Ev>,
}

impl<Ev> Capability<Ev> for Telemetry<Ev> {
    type Operation = TelemetryOperation;
    type MappedSelf<MappedEv> = Telemetry<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Telemetry::new(self.context.map_event(f))
    }
}

impl<Ev> Telemetry<Ev>
where
    Ev: 'static,
{
    #[must_use]
    pub fn new(context: CapabilityContext<TelemetryOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn counter(&self, name: &str, value: u64) {
        self.emit(TelemetryOperation::Counter {
            name: name.to_string(),
            value,
        });
    }

    pub fn event(&self, name: &str, attributes: &[(&str, &str)]) {
        self.emit(TelemetryOperation::Event {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
    }

    pub fn error(&self, operation: &str, message: &str) {
        self.emit(TelemetryOperation::Error {
            operation: operation.to_string(),
            message: message.to_string(),
        });
    }

    fn emit(&self, operation: TelemetryOperation) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(operation).await;
        });
    }
}
