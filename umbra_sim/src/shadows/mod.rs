//! Default shadow set for the demonstration platform.
//!
//! | Shadow              | Real class                 | Notes                               |
//! |---------------------|----------------------------|-------------------------------------|
//! | `ShadowCounter`     | `com.example.Counter`      | instance state plus a static        |
//! | `ShadowHandler`     | `android.os.Handler`       | posts runnables to a context        |
//! | `ShadowSystemClock` | `android.os.SystemClock`   | statics backed by the main clock    |
//! | `ShadowView`        | `android.view.View`        | visibility, click listener          |
//! | `ShadowTextView`    | `android.widget.TextView`  | extends `ShadowView`                |

mod counter;
mod handler;
mod system_clock;
mod view;

pub use counter::{shadow_counter, CounterState};
pub use handler::{shadow_handler, HandlerState};
pub use system_clock::shadow_system_clock;
pub use view::{shadow_text_view, shadow_view, TextViewState, ViewState};

use std::sync::{Mutex, MutexGuard, PoisonError};
use umbra_core::{ShadowEngine, ShadowError, ShadowSet, Value};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs a runnable: application code is called directly, a platform object
/// gets `run()` dispatched through the engine.
pub(crate) fn run_runnable(engine: &ShadowEngine, runnable: &Value) -> Result<(), ShadowError> {
    match runnable {
        Value::Callback(callback) => callback.call(&[]).map(|_| ()),
        Value::Object(object) => engine.invoke(object, "run", &[]).map(|_| ()),
        other => Err(ShadowError::illegal_argument(format!(
            "not a runnable: {other:?}"
        ))),
    }
}

/// Every shadow the sandbox installs at startup.
pub fn default_shadows() -> ShadowSet {
    let view = shadow_view();
    ShadowSet::new()
        .with(shadow_counter())
        .with(shadow_handler())
        .with(shadow_system_clock())
        .with(shadow_text_view(&view))
        .with(view)
}
