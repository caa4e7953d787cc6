pub use crate::attrs::{AttrValue, EventAttrKey, StreamAttrKey, TraceAttrKey};
pub use crate::config::CtfConfig;
pub use crate::declaration::Declaration;
pub use crate::definition::Definition;
pub use crate::error::Error;
pub use crate::event::EventDefinition;
pub use crate::metadata::{EventDeclaration, StreamDeclaration, TraceMetadata};
pub use crate::opts::ReaderOpts;
pub use crate::packet::{PacketIndex, PacketIndexEntry, Target};
pub use crate::reader::TraceReader;
pub use crate::schema::TraceSchema;
pub use crate::stream::StreamInput;
pub use crate::types::{Interruptor, LostEventsPolicy};
