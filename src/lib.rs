pub mod clock;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod tz;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{Engine, EngineError, MemoryStore, ReservationStore, StoreError};
pub use model::{
    BookingRequest, ConflictDetail, OccurrenceConflicts, Recurrence, RecurrenceFreq, Reservation,
    ReservationEvent, ReservationStatus, SeriesStatus, SeriesUpdate, Span,
};
pub use notify::NotifyHub;
pub use tz::TzConverter;
