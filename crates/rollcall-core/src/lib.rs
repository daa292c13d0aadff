pub mod capacity;
pub mod credential;
pub mod error;
pub mod events;
pub mod id;
pub mod registration;
pub mod time;

pub use capacity::{CapacityMode, Category, EventCapacity, SlotSelection, TimeSlot};
pub use credential::{EntryCredential, EntryPayload, ExitCredential, ExitPayload, generate_exit_token};
pub use error::{CoreError, Result};
pub use events::{AttendanceChanged, CategoryOccupancy, OccupancyChanged, topics};
pub use id::{CategoryId, EventId, RegistrationId, SlotId, UserId, VolunteerId, generate_id};
pub use registration::{AttendanceState, GroupMember, Registration};
pub use time::{Timestamp, WallTime, now_utc};
