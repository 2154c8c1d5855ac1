//! `ShadowView` and `ShadowTextView`.
//!
//! `ShadowTextView` extends `ShadowView`: every view operation works on a
//! text view, and code that asks for a text view's `ViewState` gets the
//! embedded one.

use super::lock;
use crate::platform::{TEXT_VIEW, VIEW, VISIBLE};

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use umbra_core::{Callback, ShadowClass, ShadowClassRef, Value, ValueType};

#[derive(Debug)]
pub struct ViewState {
    pub visibility: AtomicI64,
    pub on_click: Mutex<Option<Callback>>,
    /// Clicks delivered to a listener
    pub clicks: AtomicUsize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            visibility: AtomicI64::new(VISIBLE),
            on_click: Mutex::new(None),
            clicks: AtomicUsize::new(0),
        }
    }
}

#[derive(Debug, Default)]
pub struct TextViewState {
    pub view: ViewState,
    pub text: Mutex<String>,
}

pub fn shadow_view() -> ShadowClassRef {
    ShadowClass::builder::<ViewState>("ShadowView", VIEW)
        .constructor(&[], |_, _| Ok(()))
        .method("getVisibility", &[], |state, _| {
            Ok(Value::Int(state.visibility.load(Ordering::SeqCst)))
        })
        .method("setVisibility", &[ValueType::Int], |state, inv| {
            state.visibility.store(inv.args().int(0)?, Ordering::SeqCst);
            Ok(Value::Void)
        })
        .method("setOnClickListener", &[ValueType::Callback], |state, inv| {
            let listener = inv.args().get(0)?.as_callback().cloned();
            *lock(&state.on_click) = listener;
            Ok(Value::Void)
        })
        .method("isClickable", &[], |state, _| Ok(Value::Bool(lock(&state.on_click).is_some())))
        .method("performClick", &[], |state, inv| {
            // Release the lock before running application code.
            let listener = lock(&state.on_click).clone();
            match listener {
                Some(listener) => {
                    state.clicks.fetch_add(1, Ordering::SeqCst);
                    listener.call(&[Value::Object(inv.this().clone())])?;
                    Ok(Value::Bool(true))
                }
                None => Ok(Value::Bool(false)),
            }
        })
        .method("post", &[ValueType::Callback], |_, inv| {
            let engine = inv.engine();
            let callback = inv.args().callback(0)?.clone();
            let main = engine.contexts().main_name().to_string();
            engine.post(&main, Duration::ZERO, move || {
                callback.call(&[])?;
                Ok(())
            })?;
            Ok(Value::Bool(true))
        })
        .build()
}

pub fn shadow_text_view(view: &ShadowClassRef) -> ShadowClassRef {
    ShadowClass::builder::<TextViewState>("ShadowTextView", TEXT_VIEW)
        .extends(view, |state| &state.view)
        .constructor(&[], |_, _| Ok(()))
        .constructor(&[ValueType::Str], |state, inv| {
            let text = inv.args().str(0)?;
            *lock(&state.text) = text.to_string();
            inv.this().set_field("mText", text);
            Ok(())
        })
        .method("setText", &[ValueType::Str], |state, inv| {
            let text = inv.args().get(0)?.as_str().unwrap_or_default().to_string();
            inv.this().set_field("mText", text.as_str());
            *lock(&state.text) = text;
            Ok(Value::Void)
        })
        .method("getText", &[], |state, _| Ok(Value::from(lock(&state.text).clone())))
        .method("length", &[], |state, _| {
            Ok(Value::Int(lock(&state.text).chars().count() as i64))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{GONE, TEXT_VIEW, VIEW};
    use crate::sandbox::Sandbox;
    use std::sync::Arc;

    #[test]
    fn test_visibility() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let view = engine.new_instance_of(VIEW, &[]).unwrap();

        assert_eq!(engine.invoke(&view, "getVisibility", &[]).unwrap(), Value::Int(VISIBLE));
        engine.invoke(&view, "setVisibility", &[Value::Int(GONE)]).unwrap();
        assert_eq!(engine.invoke(&view, "getVisibility", &[]).unwrap(), Value::Int(GONE));
    }

    #[test]
    fn test_click_listener_receives_view() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let view = engine.new_instance_of(VIEW, &[]).unwrap();
        let clicked = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&clicked);

        assert_eq!(engine.invoke(&view, "performClick", &[]).unwrap(), Value::Bool(false));
        let listener = Callback::new(move |args| {
            *sink.lock().unwrap() = args.first().and_then(Value::as_object).map(|o| o.id());
            Ok(Value::Void)
        });
        engine.invoke(&view, "setOnClickListener", &[Value::Callback(listener)]).unwrap();

        assert_eq!(engine.invoke(&view, "isClickable", &[]).unwrap(), Value::Bool(true));
        assert_eq!(engine.invoke(&view, "performClick", &[]).unwrap(), Value::Bool(true));
        assert_eq!(*clicked.lock().unwrap(), Some(view.id()));
    }

    #[test]
    fn test_text_view_is_a_view() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let text_view = engine.new_instance_of(TEXT_VIEW, &[Value::from("hello")]).unwrap();

        assert_eq!(engine.invoke(&text_view, "getText", &[]).unwrap(), Value::from("hello"));
        assert_eq!(text_view.field("mText"), Some(Value::from("hello")));

        engine.invoke(&text_view, "setVisibility", &[Value::Int(GONE)]).unwrap();
        let visibility = engine
            .with_shadow(&text_view, |state: &ViewState| state.visibility.load(Ordering::SeqCst))
            .unwrap();
        assert_eq!(visibility, GONE);

        let shadow = engine.shadow_of(&text_view).unwrap();
        assert!(shadow.is_kind_of("ShadowView"));
        assert_eq!(shadow.class_name(), "ShadowTextView");
    }

    #[test]
    fn test_set_text_and_length() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let text_view = engine.new_instance_of(TEXT_VIEW, &[]).unwrap();

        engine.invoke(&text_view, "setText", &[Value::from("héllo")]).unwrap();
        assert_eq!(engine.invoke(&text_view, "length", &[]).unwrap(), Value::Int(5));
        engine.invoke(&text_view, "setText", &[Value::Null]).unwrap();
        assert_eq!(engine.invoke(&text_view, "getText", &[]).unwrap(), Value::from(""));
    }

    #[test]
    fn test_unshadowed_view_methods_use_defaults() {
        let sandbox = Sandbox::default();
        let engine = sandbox.engine();
        let text_view = engine.new_instance_of(TEXT_VIEW, &[]).unwrap();

        assert_eq!(engine.invoke(&text_view, "invalidate", &[]).unwrap(), Value::Void);
        assert_eq!(engine.invoke(&text_view, "getAlpha", &[]).unwrap(), Value::Float(0.0));
        assert_eq!(engine.invoke(&text_view, "hashCode", &[]).unwrap(), Value::Int(0));
    }
}
