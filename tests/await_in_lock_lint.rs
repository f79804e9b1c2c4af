#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Source lint: no `.await` while a lock guard is alive.
//!
//! A task that suspends with a guard held blocks every other task waiting on
//! the same lock until it is polled again. In this crate that would stall the
//! poll loop behind an HTTP request, or the API behind the poll loop.
//!
//! ```ignore
//! // flagged
//! let health = self.health.write().await;
//! self.reader.get("status").await;
//!
//! // fine: guard confined to a block
//! let previous = {
//!     let mut health = self.health.write().await;
//!     health.available.replace(true)
//! };
//! self.reader.get("status").await;
//! ```
//!
//! Guards that must span an await (the coordinator's single-flight guard) are
//! listed in [`ALLOWLIST`].

use std::fs;
use std::path::Path;
use syn::visit::Visit;
use syn::{Expr, ExprAwait, File, Local, Pat};
use walkdir::WalkDir;

/// Guards deliberately held across `.await`: (file suffix, guard name, reason)
const ALLOWLIST: &[(&str, &str, &str)] = &[(
    "coordinator.rs",
    "in_flight",
    "Serializes poll cycles; holding it for the whole cycle is what makes fetches single-flight",
)];

fn is_lock_method(method: &str) -> bool {
    matches!(
        method,
        "lock"
            | "read"
            | "write"
            | "try_lock"
            | "try_read"
            | "try_write"
            | "lock_owned"
            | "read_owned"
            | "write_owned"
    )
}

/// `x.lock()` or `x.lock().await`
fn acquires_lock(expr: &Expr) -> bool {
    let call = match expr {
        Expr::Await(await_expr) => &*await_expr.base,
        other => other,
    };
    matches!(call, Expr::MethodCall(m) if is_lock_method(&m.method.to_string()))
}

fn binding_name(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        Pat::Type(typed) => binding_name(&typed.pat),
        _ => None,
    }
}

struct GuardTracker {
    file: String,
    depth: usize,
    /// (guard name, block depth it was bound at)
    live: Vec<(String, usize)>,
    violations: Vec<(String, Vec<String>)>,
}

impl GuardTracker {
    fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            depth: 0,
            live: Vec::new(),
            violations: Vec::new(),
        }
    }

    fn live_names(&self) -> Vec<String> {
        self.live.iter().map(|(name, _)| name.clone()).collect()
    }
}

impl<'ast> Visit<'ast> for GuardTracker {
    fn visit_local(&mut self, local: &'ast Local) {
        syn::visit::visit_local(self, local);

        let Some(init) = &local.init else {
            return;
        };
        if acquires_lock(&init.expr) {
            if let Some(name) = binding_name(&local.pat) {
                self.live.push((name, self.depth));
            }
        }
    }

    fn visit_expr_await(&mut self, await_expr: &'ast ExprAwait) {
        let is_acquisition = matches!(
            &*await_expr.base,
            Expr::MethodCall(m) if is_lock_method(&m.method.to_string())
        );
        if !is_acquisition && !self.live.is_empty() {
            self.violations.push((self.file.clone(), self.live_names()));
        }
        syn::visit::visit_expr_await(self, await_expr);
    }

    fn visit_block(&mut self, block: &'ast syn::Block) {
        self.depth += 1;
        syn::visit::visit_block(self, block);
        let depth = self.depth;
        self.live.retain(|(_, bound_at)| *bound_at < depth);
        self.depth -= 1;
    }

    fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
        if let Expr::Path(func) = &*call.func {
            if func.path.is_ident("drop") {
                if let Some(Expr::Path(arg)) = call.args.first() {
                    if let Some(ident) = arg.path.get_ident() {
                        let name = ident.to_string();
                        self.live.retain(|(g, _)| *g != name);
                    }
                }
            }
        }
        syn::visit::visit_expr_call(self, call);
    }
}

fn scan(file: &str, source: &str) -> Vec<(String, Vec<String>)> {
    let syntax: File = syn::parse_file(source).unwrap();
    let mut tracker = GuardTracker::new(file);
    tracker.visit_file(&syntax);
    tracker.violations
}

fn is_allowed(file: &str, guard: &str) -> bool {
    ALLOWLIST
        .iter()
        .any(|(suffix, allowed, _)| file.ends_with(suffix) && guard == *allowed)
}

#[test]
fn flags_await_while_guard_alive() {
    let code = r#"
        async fn record(&self) {
            let health = self.health.write().await;
            self.reader.get("status").await;
        }
    "#;
    let violations = scan("test.rs", code);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].1, vec!["health".to_string()]);
}

#[test]
fn flags_typed_binding() {
    let code = r#"
        async fn record(&self) {
            let health: RwLockWriteGuard<'_, Health> = self.health.write().await;
            tokio::time::sleep(d).await;
        }
    "#;
    assert_eq!(scan("test.rs", code).len(), 1);
}

#[test]
fn allows_guard_confined_to_block() {
    let code = r#"
        async fn record(&self) {
            let previous = {
                let mut health = self.health.write().await;
                health.available.replace(true)
            };
            self.bus_publish().await;
        }
    "#;
    assert!(scan("test.rs", code).is_empty());
}

#[test]
fn allows_explicit_drop() {
    let code = r#"
        async fn refresh(&self) {
            let state = self.state.write().await;
            let running = state.running;
            drop(state);
            self.coordinator.first_refresh().await;
        }
    "#;
    assert!(scan("test.rs", code).is_empty());
}

#[test]
fn single_flight_guard_is_allowlisted() {
    let code = r#"
        async fn refresh(&self) {
            let in_flight = self.in_flight.lock().await;
            let result = self.run_cycle().await;
            drop(in_flight);
            result
        }
    "#;
    let violations = scan("src/coordinator.rs", code);
    assert_eq!(violations.len(), 1);
    assert!(violations[0]
        .1
        .iter()
        .all(|g| is_allowed("src/coordinator.rs", g)));
    assert!(!is_allowed("src/adapters/brama.rs", "in_flight"));
}

#[test]
fn no_await_in_lock_violations() {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut report = Vec::new();

    for entry in WalkDir::new(&src_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
    {
        let path = entry.path();
        let Ok(source) = fs::read_to_string(path) else {
            continue;
        };
        let file = path.display().to_string();
        for (file, guards) in scan(&file, &source) {
            if !guards.iter().all(|g| is_allowed(&file, g)) {
                report.push(format!("  - {}: holding {}", file, guards.join(", ")));
            }
        }
    }

    if !report.is_empty() {
        panic!(
            "\n\nFound .await while holding a lock guard.\n\
             Release the guard first (scope it in a block or drop() it),\n\
             or add it to ALLOWLIST with a reason.\n\n{}\n",
            report.join("\n")
        );
    }
}
