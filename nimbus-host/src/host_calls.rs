// Host functions the managed guest imports. Everything lives in the
// "nimbus" import module. Object traffic resolves entity ids through the
// registry; a dead id is reported to the guest, never a trap.
//
// Buffer protocol for calls that return a value: the guest passes an output
// buffer (ptr, cap). The host writes the JSON result and returns the
// written length, or the negated required length when the buffer is too
// small so the guest can retry.

use nimbus_bridge::marshal;
use nimbus_core::{entity_registry, message_queue, EntityId, StringName, Variant};
use tracing::{debug, error, info, warn};
use wasmtime::{Caller, Linker, Result};

use crate::host::{read_guest_bytes, write_guest_bytes, HostState};

fn guest_str(caller: &Caller<'_, HostState>, ptr: i32, len: i32) -> String {
    String::from_utf8_lossy(&read_guest_bytes(caller, ptr as u32, len as u32)).into_owned()
}

fn decode_args(bytes: &[u8]) -> Option<Vec<Variant>> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(bytes).ok()?;
    values
        .iter()
        .map(|v| marshal::decode(v).ok())
        .collect()
}

fn encode_value(value: &Variant) -> Option<Vec<u8>> {
    let encoded = marshal::encode(value).ok()?;
    serde_json::to_vec(&encoded).ok()
}

/// Write `bytes` into the guest's output buffer, or report the needed size.
fn write_result(
    caller: &mut Caller<'_, HostState>,
    out_ptr: i32,
    out_cap: i32,
    bytes: &[u8],
) -> i64 {
    if bytes.len() > out_cap as usize {
        return -(bytes.len() as i64);
    }
    write_guest_bytes(caller, out_ptr as u32, bytes);
    bytes.len() as i64
}

pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // Guest import: fn nimbus_host_log(level: i32, ptr: i32, len: i32)
    linker.func_wrap(
        "nimbus",
        "nimbus_host_log",
        |caller: Caller<'_, HostState>, level: i32, ptr: i32, len: i32| {
            let message = guest_str(&caller, ptr, len);
            match level {
                0 => debug!(target: "managed", "{message}"),
                1 => info!(target: "managed", "{message}"),
                2 => warn!(target: "managed", "{message}"),
                _ => error!(target: "managed", "{message}"),
            }
        },
    )?;

    // Guest import: fn nimbus_host_object_set(id, name ptr/len, value ptr/len) -> i32
    linker.func_wrap(
        "nimbus",
        "nimbus_host_object_set",
        |caller: Caller<'_, HostState>,
         id: i64,
         name_ptr: i32,
         name_len: i32,
         val_ptr: i32,
         val_len: i32|
         -> i32 {
            let Some(obj) = entity_registry().resolve(EntityId::from_raw(id as u64)) else {
                return 0;
            };
            let name = StringName::new(&guest_str(&caller, name_ptr, name_len));
            let bytes = read_guest_bytes(&caller, val_ptr as u32, val_len as u32);
            let Ok(encoded) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
                return 0;
            };
            let Ok(value) = marshal::decode(&encoded) else {
                return 0;
            };
            obj.set(name, &value) as i32
        },
    )?;

    // Guest import: fn nimbus_host_object_get(id, name ptr/len, out ptr/cap) -> i64
    linker.func_wrap(
        "nimbus",
        "nimbus_host_object_get",
        |mut caller: Caller<'_, HostState>,
         id: i64,
         name_ptr: i32,
         name_len: i32,
         out_ptr: i32,
         out_cap: i32|
         -> i64 {
            let Some(obj) = entity_registry().resolve(EntityId::from_raw(id as u64)) else {
                return 0;
            };
            let name = StringName::new(&guest_str(&caller, name_ptr, name_len));
            let Some(value) = obj.get(name) else {
                return 0;
            };
            let Some(bytes) = encode_value(&value) else {
                warn!(property = %name, "property value cannot cross the managed boundary");
                return 0;
            };
            write_result(&mut caller, out_ptr, out_cap, &bytes)
        },
    )?;

    // Guest import: fn nimbus_host_object_call(id, method ptr/len, args ptr/len, out ptr/cap) -> i64
    linker.func_wrap(
        "nimbus",
        "nimbus_host_object_call",
        |mut caller: Caller<'_, HostState>,
         id: i64,
         method_ptr: i32,
         method_len: i32,
         args_ptr: i32,
         args_len: i32,
         out_ptr: i32,
         out_cap: i32|
         -> i64 {
            let Some(obj) = entity_registry().resolve(EntityId::from_raw(id as u64)) else {
                return 0;
            };
            let method = StringName::new(&guest_str(&caller, method_ptr, method_len));
            let bytes = read_guest_bytes(&caller, args_ptr as u32, args_len as u32);
            let Some(args) = decode_args(&bytes) else {
                return 0;
            };
            match obj.call(method, &args) {
                Ok(value) => match encode_value(&value) {
                    Some(bytes) => write_result(&mut caller, out_ptr, out_cap, &bytes),
                    None => 0,
                },
                Err(e) => {
                    error!(method = %method, error = %e, "managed call into native failed");
                    0
                }
            }
        },
    )?;

    // Guest import: fn nimbus_host_object_call_deferred(id, method ptr/len, args ptr/len)
    linker.func_wrap(
        "nimbus",
        "nimbus_host_object_call_deferred",
        |caller: Caller<'_, HostState>,
         id: i64,
         method_ptr: i32,
         method_len: i32,
         args_ptr: i32,
         args_len: i32| {
            let target = EntityId::from_raw(id as u64);
            let method = StringName::new(&guest_str(&caller, method_ptr, method_len));
            let bytes = read_guest_bytes(&caller, args_ptr as u32, args_len as u32);
            let Some(args) = decode_args(&bytes) else {
                return;
            };
            message_queue().push_call(target, method, args, true);
        },
    )?;

    // Guest import: fn nimbus_host_emit_signal(id, signal ptr/len, args ptr/len) -> i32
    linker.func_wrap(
        "nimbus",
        "nimbus_host_emit_signal",
        |caller: Caller<'_, HostState>,
         id: i64,
         signal_ptr: i32,
         signal_len: i32,
         args_ptr: i32,
         args_len: i32|
         -> i32 {
            let Some(obj) = entity_registry().resolve(EntityId::from_raw(id as u64)) else {
                return 0;
            };
            let signal = StringName::new(&guest_str(&caller, signal_ptr, signal_len));
            let bytes = read_guest_bytes(&caller, args_ptr as u32, args_len as u32);
            let Some(args) = decode_args(&bytes) else {
                return 0;
            };
            obj.emit_signal(signal, &args);
            1
        },
    )?;

    Ok(())
}
