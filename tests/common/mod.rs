/*!
 * Simulated Engine
 * An in-process stand-in for the foreign transactional engine, with a staged
 * key-value store and scriptable signal-dispatch behavior
 */

// Not every test binary exercises every helper
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use txgate::{Connection, Engine, EngineStatus, SessionToken, Signal, TxnStatus};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// How the simulated engine reacts to a dispatched signal.
#[derive(Debug, Clone)]
pub enum DispatchBehavior {
    Ok,
    Deferred,
    AlreadyDown,
    Error(i32, String),
    /// Emulates a process-fatal handler: blocks the dispatching thread until
    /// the engine itself is rundown, then reports AlreadyDown. Real fatal
    /// handlers never return at all; returning on rundown lets tests finish.
    BlockUntilRundown,
}

struct OpenTxn {
    parent: u64,
    writes: HashMap<String, String>,
}

#[derive(Default)]
struct Store {
    committed: HashMap<String, String>,
    open: HashMap<u64, OpenTxn>,
}

/// Simulated engine implementing the full [`Engine`] contract.
pub struct SimEngine {
    store: Mutex<Store>,
    behavior: Mutex<HashMap<Signal, DispatchBehavior>>,
    dispatch_counts: Mutex<HashMap<Signal, usize>>,
    next_token: AtomicU64,
    started: AtomicBool,
    down: AtomicBool,
    /// When set, the next transaction call runs one attempt and then reports
    /// the engine-driven deadline as expired
    expire_deadline: AtomicBool,
    /// Artificial rundown latency, for exercising the bounded rundown wait
    rundown_delay: Mutex<Option<Duration>>,
    max_restarts: u64,
}

impl SimEngine {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            behavior: Mutex::new(HashMap::new()),
            dispatch_counts: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(0),
            started: AtomicBool::new(false),
            down: AtomicBool::new(false),
            expire_deadline: AtomicBool::new(false),
            rundown_delay: Mutex::new(None),
            max_restarts: 64,
        }
    }

    pub fn set_behavior(&self, signal: Signal, behavior: DispatchBehavior) {
        self.behavior.lock().insert(signal, behavior);
    }

    pub fn dispatch_count(&self, signal: Signal) -> usize {
        self.dispatch_counts.lock().get(&signal).copied().unwrap_or(0)
    }

    pub fn expire_next_deadline(&self) {
        self.expire_deadline.store(true, Ordering::SeqCst);
    }

    pub fn set_rundown_delay(&self, delay: Duration) {
        *self.rundown_delay.lock() = Some(delay);
    }

    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    /// Committed (transaction-visible) read through `conn`'s nesting chain.
    pub fn get(&self, conn: &Connection, key: &str) -> Option<String> {
        let store = self.store.lock();
        let mut token = conn.token().raw();
        while token != 0 {
            match store.open.get(&token) {
                Some(txn) => {
                    if let Some(value) = txn.writes.get(key) {
                        return Some(value.clone());
                    }
                    token = txn.parent;
                }
                None => break,
            }
        }
        store.committed.get(key).cloned()
    }

    /// Write through `conn`: staged when a transaction is open, committed
    /// directly otherwise.
    pub fn set(&self, conn: &Connection, key: &str, value: &str) {
        let mut store = self.store.lock();
        let token = conn.token().raw();
        match store.open.get_mut(&token) {
            Some(txn) => {
                txn.writes.insert(key.to_string(), value.to_string());
            }
            None => {
                store.committed.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Read of durable state only, ignoring any open transaction.
    pub fn committed(&self, key: &str) -> Option<String> {
        self.store.lock().committed.get(key).cloned()
    }

    fn commit(&self, token: u64) {
        let mut store = self.store.lock();
        if let Some(txn) = store.open.remove(&token) {
            let OpenTxn { parent, writes } = txn;
            if let Some(parent_txn) = store.open.get_mut(&parent) {
                parent_txn.writes.extend(writes);
            } else {
                store.committed.extend(writes);
            }
        }
    }

    fn discard(&self, token: u64) {
        self.store.lock().open.remove(&token);
    }
}

impl Engine for SimEngine {
    fn startup(&self) -> EngineStatus {
        self.started.store(true, Ordering::SeqCst);
        self.down.store(false, Ordering::SeqCst);
        EngineStatus::Ok
    }

    fn rundown(&self) -> EngineStatus {
        if let Some(delay) = *self.rundown_delay.lock() {
            std::thread::sleep(delay);
        }
        if self.down.swap(true, Ordering::SeqCst) {
            EngineStatus::AlreadyDown
        } else {
            EngineStatus::Ok
        }
    }

    fn signal_dispatch(&self, conn: &mut Connection, signal: Signal) -> EngineStatus {
        if self.is_down() {
            conn.set_error_text("engine already rundown");
            return EngineStatus::AlreadyDown;
        }
        *self.dispatch_counts.lock().entry(signal).or_insert(0) += 1;

        let behavior = self
            .behavior
            .lock()
            .get(&signal)
            .cloned()
            .unwrap_or(DispatchBehavior::Ok);
        match behavior {
            DispatchBehavior::Ok => EngineStatus::Ok,
            DispatchBehavior::Deferred => EngineStatus::Deferred,
            DispatchBehavior::AlreadyDown => {
                conn.set_error_text("engine already rundown");
                EngineStatus::AlreadyDown
            }
            DispatchBehavior::Error(code, message) => {
                conn.set_error_text(message.clone());
                EngineStatus::Error { code, message }
            }
            DispatchBehavior::BlockUntilRundown => {
                while !self.is_down() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                conn.set_error_text("engine already rundown");
                EngineStatus::AlreadyDown
            }
        }
    }

    fn transaction_call(
        &self,
        conn: &mut Connection,
        _name: &str,
        _restore_list: &[String],
        callback: &mut dyn FnMut(&mut Connection, SessionToken) -> TxnStatus,
    ) -> EngineStatus {
        if !self.started.load(Ordering::SeqCst) || self.is_down() {
            conn.set_error_text("engine already rundown");
            return EngineStatus::AlreadyDown;
        }

        let parent = conn.token().raw();
        let mut restarts = 0;
        loop {
            if self.is_down() {
                conn.set_error_text("engine already rundown");
                return EngineStatus::AlreadyDown;
            }

            let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
            self.store.lock().open.insert(
                token,
                OpenTxn {
                    parent,
                    writes: HashMap::new(),
                },
            );

            let status = callback(conn, SessionToken::new(token));

            if self.expire_deadline.swap(false, Ordering::SeqCst) {
                self.discard(token);
                conn.set_error_text("transaction deadline expired");
                return EngineStatus::Timeout;
            }

            match status {
                TxnStatus::Ok => {
                    self.commit(token);
                    return EngineStatus::Ok;
                }
                TxnStatus::Restart => {
                    self.discard(token);
                    restarts += 1;
                    if restarts > self.max_restarts {
                        conn.set_error_text("restart limit exhausted");
                        return EngineStatus::Error {
                            code: 4501,
                            message: "restart limit exhausted".to_string(),
                        };
                    }
                }
                TxnStatus::Rollback => {
                    self.discard(token);
                    return EngineStatus::Rollback;
                }
            }
        }
    }
}
