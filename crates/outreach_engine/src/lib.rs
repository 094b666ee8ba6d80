//! Outreach engine: browser-driven job workers, result sinks and the job registry.
mod collection;
mod contacts;
mod control;
mod controller;
mod gate;
mod messaging;
mod persist;
mod registry;
mod reporter;
mod session;
mod settings;
mod sink;
mod strategy;
mod summary;
mod types;
mod webdriver;
mod worker;

pub use collection::{
    extract_item_links, extract_page_count, CollectionProfile, CollectionStrategy, FieldSpec,
    FieldTransform, ProfileError,
};
pub use contacts::{load_contacts, Contact, ContactColumns, ContactsError};
pub use control::{Control, ControlFlags, Flow};
pub use controller::JobController;
pub use gate::{CheckpointGate, GateOutcome};
pub use messaging::{MessagingProfile, MessagingStrategy, PHONE_PLACEHOLDER, TEXT_PLACEHOLDER};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use registry::{JobParams, JobRegistry, RegistryError};
pub use reporter::{ChannelProgressSink, ProgressSink, Reporter, ReporterHandle};
pub use session::{BrowserSession, SessionError, SessionFactory, SessionSlot, SUBMIT_KEY};
pub use settings::EngineSettings;
pub use sink::{ResultSink, SinkError};
pub use strategy::WorkUnitStrategy;
pub use summary::write_job_summary;
pub use types::{
    EngineEvent, ItemFailure, ItemFailureKind, ItemOutcome, LogEntry, LogLevel, PageItems,
    Preparation, ProgressEvent, ProgressKind, Record, WorkItem,
};
pub use webdriver::{WebDriverSession, WebDriverSessionFactory, WebDriverSettings};
