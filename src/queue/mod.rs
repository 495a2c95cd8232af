pub mod payment_queue;

pub use payment_queue::{create_queue, DispatchTrigger};
