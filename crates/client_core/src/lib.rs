pub mod controller;
pub mod error;
pub mod render;
pub mod request;
pub mod session;
pub mod status;
pub mod transport;

pub use controller::{
    AskController, Completion, ExtractTextController, FetchConfigController, Phase,
};
pub use error::{ImageReadError, TransportError, ValidationError};
pub use render::{basename, format_citation, AnswerView};
pub use request::{parse_top_k, Endpoint, FormState, ImageFile, DEFAULT_TOP_K};
pub use session::{Action, TutorSession};
pub use status::{Slot, StatusChannel};
pub use transport::{Backend, BackendCall, HttpBackend, RawReply, Reply, RequestBody};
