use std::{cell::RefCell, ffi::OsStr};

#[derive(Clone, Copy)]
struct Env {
    /// Maximum instructions executed by `run`
    step_limit: Option<usize>,
    history_enabled: bool,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        step_limit: var_usize("BACKSTEP_STEP_LIMIT"),
        history_enabled: !var_is("BACKSTEP_HISTORY", "0"),
    };
    set_env(value);
}

pub fn step_limit() -> Option<usize> {
    with_env(|env| env.step_limit)
}

/// Whether `run` records history. The debugger always does.
pub fn is_history_enabled() -> bool {
    with_env(|env| env.history_enabled)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

/// Unset or unparseable values are ignored.
fn var_usize(name: impl AsRef<OsStr>) -> Option<usize> {
    std::env::var(name.as_ref())
        .ok()
        .and_then(|v| v.trim().parse().ok())
}
