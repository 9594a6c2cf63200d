//! A store bound to one piece of state, shared by UI components through a hook-shaped interface.
//!
//! ```
//! use hooksack::{make_store, Runtime};
//!
//! let mut rt = Runtime::new();
//! let use_clicks = make_store(0);
//!
//! let view = rt.mount({
//!     let use_clicks = use_clicks.clone();
//!     move |cx| {
//!         let clicks = use_clicks.use_state(cx);
//!         println!("clicks: {clicks}");
//!     }
//! });
//! let setter = use_clicks.store().setter();
//! setter.update(|clicks| clicks + 1);
//! rt.update();
//!
//! assert_eq!(*use_clicks.store().state(), 1);
//! assert_eq!(rt.render_count(view).unwrap(), 2);
//! ```
mod batch;
mod host;
mod runtime;
mod store;
mod subscribers;
mod subscription;
mod view;

pub use batch::*;
pub use host::*;
pub use runtime::*;
pub use store::*;
pub use subscribers::Callback;
pub use subscription::*;
pub use view::*;
