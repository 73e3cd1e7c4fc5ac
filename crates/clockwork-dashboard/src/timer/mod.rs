pub mod clock;
pub mod engine;
pub mod events;


pub use clock::Clock;
pub use engine::{TimerEngine, TimerEngineError};
pub use events::{TimerEvent, TimerEventType};
