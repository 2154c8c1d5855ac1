//! Demonstration platform: class descriptors for a handful of platform and
//! application classes.
//!
//! ```text
//!  java.lang.Object
//!   ├── android.os.Handler
//!   ├── android.os.SystemClock        (statics only)
//!   ├── android.view.View
//!   │    └── android.widget.TextView
//!   ├── android.graphics.Point        (plain data holder)
//!   ├── com.example.Counter
//!   └── com.example.Mystery           (never shadowed)
//!
//!  java.lang.Runnable (interface)
//! ```

use umbra_core::{ClassDescriptor, ClassRef, ShadowEngine, ValueType};

pub const OBJECT: &str = "java.lang.Object";
pub const RUNNABLE: &str = "java.lang.Runnable";
pub const HANDLER: &str = "android.os.Handler";
pub const SYSTEM_CLOCK: &str = "android.os.SystemClock";
pub const VIEW: &str = "android.view.View";
pub const TEXT_VIEW: &str = "android.widget.TextView";
pub const POINT: &str = "android.graphics.Point";
pub const COUNTER: &str = "com.example.Counter";
pub const MYSTERY: &str = "com.example.Mystery";

/// `View.VISIBLE`
pub const VISIBLE: i64 = 0;
/// `View.INVISIBLE`
pub const INVISIBLE: i64 = 4;
/// `View.GONE`
pub const GONE: i64 = 8;

/// Builds every demonstration class.
pub fn classes() -> Vec<ClassRef> {
    use ValueType::{Bool, Callback, Float, Int, Object, Str, Void};

    let object = ClassDescriptor::class(OBJECT)
        .method("hashCode", &[], Int)
        .method("toString", &[], Str)
        .build();

    let runnable = ClassDescriptor::interface(RUNNABLE)
        .method("run", &[], Void)
        .build();

    let mut handler = ClassDescriptor::class(HANDLER).extends(&object);
    // A runnable is either application code (a callback) or an object
    // implementing java.lang.Runnable.
    for runnable_type in [Callback, Object] {
        handler = handler
            .method("post", &[runnable_type], Bool)
            .method("postDelayed", &[runnable_type, Int], Bool)
            .method("postAtFrontOfQueue", &[runnable_type], Bool)
            .method("removeCallbacks", &[runnable_type], Void);
    }
    let handler = handler
        .method("getLooperName", &[], Str)
        .method("hasCallbacks", &[], Bool)
        .build();

    let system_clock = ClassDescriptor::class(SYSTEM_CLOCK)
        .extends(&object)
        .static_method("uptimeMillis", &[], Int)
        .static_method("elapsedRealtime", &[], Int)
        .static_method("currentThreadTimeMillis", &[], Int)
        .static_method("sleep", &[Int], Void)
        .build();

    let view = ClassDescriptor::class(VIEW)
        .extends(&object)
        .method("getVisibility", &[], Int)
        .method("setVisibility", &[Int], Void)
        .method("setOnClickListener", &[Callback], Void)
        .method("performClick", &[], Bool)
        .method("isClickable", &[], Bool)
        .method("post", &[Callback], Bool)
        .method("invalidate", &[], Void)
        .method("getAlpha", &[], Float)
        .build();

    let text_view = ClassDescriptor::class(TEXT_VIEW)
        .extends(&view)
        .method("setText", &[Str], Void)
        .method("getText", &[], Str)
        .method("length", &[], Int)
        .build();

    let point = ClassDescriptor::class(POINT)
        .extends(&object)
        .data_holder()
        .build();

    let counter = ClassDescriptor::class(COUNTER)
        .extends(&object)
        .method("increment", &[], Void)
        .method("get", &[], Int)
        .static_method("instanceCount", &[], Int)
        .build();

    let mystery = ClassDescriptor::class(MYSTERY)
        .extends(&object)
        .implements(&runnable)
        .method("doThing", &[], Int)
        .method("describe", &[], Str)
        .build();

    vec![
        object,
        runnable,
        handler,
        system_clock,
        view,
        text_view,
        point,
        counter,
        mystery,
    ]
}

/// Loads the demonstration platform into an engine.
pub fn load(engine: &ShadowEngine) {
    for class in classes() {
        engine.load_class(&class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy() {
        let classes = classes();
        let text_view = classes.iter().find(|c| c.name() == TEXT_VIEW).unwrap();
        let names: Vec<&str> = text_view.ancestors().into_iter().map(|c| c.name()).collect();
        assert_eq!(names, vec![TEXT_VIEW, VIEW, OBJECT]);

        let mystery = classes.iter().find(|c| c.name() == MYSTERY).unwrap();
        assert!(mystery.is_assignable_to(RUNNABLE));
    }

    #[test]
    fn test_load() {
        let engine = ShadowEngine::default();
        load(&engine);
        for name in [OBJECT, RUNNABLE, HANDLER, SYSTEM_CLOCK, VIEW, TEXT_VIEW, POINT, COUNTER, MYSTERY] {
            assert!(engine.class(name).is_ok(), "{name} not loaded");
        }
    }
}
