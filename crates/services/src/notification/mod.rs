pub mod memory;
pub mod order;
pub mod router;
pub mod store;
pub mod view;

pub use memory::InMemoryNotificationStore;
pub use order::OrderSummary;
pub use router::{EventRouter, RoutedEvent};
pub use store::{NotificationDraft, NotificationStore};
pub use view::NotificationView;
