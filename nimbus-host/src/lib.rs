// nimbus-host: wasmtime embedding of managed guest assemblies.
//
// The guest module exports the `nimbus_*` ABI; this crate wraps it behind
// the bridge's ManagedRuntime contract so the rest of the engine never sees
// wasmtime types.

pub mod host;
pub mod host_calls;
pub mod runtime;

pub use host::{HostState, WasmHost};
pub use runtime::WasmRuntime;
