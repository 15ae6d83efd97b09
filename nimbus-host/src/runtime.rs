// ManagedRuntime backed by a wasm guest.
//
// Every contract method forwards to one guest export. A trap or missing
// export is logged and degrades to the method's neutral value; the engine
// must keep running when the guest misbehaves.

use std::path::Path;
use std::sync::{Arc, Mutex};

use nimbus_bridge::runtime::{
    AssemblyInfo, GcHandle, InvokeError, InvokeResult, ManagedClassId, ManagedClassName,
    ManagedRuntime,
};
use nimbus_bridge::{marshal, ReloadError};
use nimbus_core::class_db::{MethodInfo, PropertyInfo};
use nimbus_core::{CallError, EntityId, StringName, Variant, VariantKind};
use serde::Deserialize;
use tracing::error;

use crate::host::WasmHost;

// nimbus_invoke_status values after a zero result.
const STATUS_INVALID_METHOD: i32 = 1;
const STATUS_EXCEPTION: i32 = 2;

/// Wire form of a property or signal declaration coming out of the guest.
#[derive(Deserialize)]
struct WireProperty {
    name: String,
    kind: String,
}

#[derive(Deserialize)]
struct WireMethod {
    name: String,
    #[serde(default)]
    args: Vec<WireProperty>,
}

fn kind_from_name(name: &str) -> VariantKind {
    VariantKind::ALL
        .iter()
        .copied()
        .find(|k| k.name() == name)
        .unwrap_or(VariantKind::Nil)
}

fn property_from_wire(wire: &WireProperty) -> PropertyInfo {
    PropertyInfo::new(kind_from_name(&wire.kind), wire.name.as_str())
}

fn method_from_wire(wire: &WireMethod) -> MethodInfo {
    MethodInfo::new(wire.name.as_str())
        .with_args(wire.args.iter().map(property_from_wire).collect())
}

fn encode_args(args: &[Variant]) -> Option<Vec<u8>> {
    let values: Vec<serde_json::Value> = args
        .iter()
        .map(|v| marshal::encode(v).ok())
        .collect::<Option<_>>()?;
    serde_json::to_vec(&values).ok()
}

pub struct WasmRuntime {
    host: Mutex<WasmHost>,
    info: AssemblyInfo,
}

impl WasmRuntime {
    /// Compile, instantiate, and initialize a guest module.
    pub fn load(wasm_bytes: &[u8]) -> Result<Arc<WasmRuntime>, ReloadError> {
        let mut host =
            WasmHost::new(wasm_bytes).map_err(|e| ReloadError::DomainLoadFailed(e.to_string()))?;
        host.call_init()
            .map_err(|e| ReloadError::DomainLoadFailed(e.to_string()))?;
        let packed = host
            .call_ret_i64("nimbus_assembly_info")
            .map_err(|e| ReloadError::DomainLoadFailed(e.to_string()))?;
        let text = host
            .read_packed_str(packed)
            .ok_or_else(|| ReloadError::DomainLoadFailed("assembly info missing".into()))?;
        let info: AssemblyInfo = serde_json::from_str(&text)
            .map_err(|e| ReloadError::DomainLoadFailed(e.to_string()))?;
        Ok(Arc::new(WasmRuntime {
            host: Mutex::new(host),
            info,
        }))
    }

    pub fn load_from_path(path: &Path) -> Result<Arc<WasmRuntime>, ReloadError> {
        let bytes = std::fs::read(path)
            .map_err(|_| ReloadError::AssemblyMissing(path.display().to_string()))?;
        WasmRuntime::load(&bytes)
    }

    fn with_host<T>(&self, default: T, f: impl FnOnce(&mut WasmHost) -> wasmtime::Result<T>) -> T {
        let mut host = self.host.lock().unwrap_or_else(|e| e.into_inner());
        match f(&mut host) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "guest call trapped");
                default
            }
        }
    }

    /// Resolve a zero result from an invoke-style export into an error.
    fn invoke_failure(host: &mut WasmHost) -> InvokeError {
        let status = host.call_ret_i32("nimbus_invoke_status").unwrap_or(0);
        match status {
            STATUS_INVALID_METHOD => InvokeError::Call(CallError::InvalidMethod),
            STATUS_EXCEPTION => {
                let message = host
                    .call_ret_i64("nimbus_take_error")
                    .ok()
                    .and_then(|packed| host.read_packed_str(packed))
                    .unwrap_or_else(|| "unknown managed exception".into());
                InvokeError::Exception(message)
            }
            _ => InvokeError::Call(CallError::InstanceNull),
        }
    }

    fn read_json<T: for<'de> Deserialize<'de>>(host: &mut WasmHost, packed: i64) -> Option<T> {
        let text = host.read_packed_str(packed)?;
        serde_json::from_str(&text).ok()
    }
}

impl ManagedRuntime for WasmRuntime {
    fn assembly_info(&self) -> AssemblyInfo {
        self.info.clone()
    }

    fn find_class(&self, name: &ManagedClassName) -> Option<ManagedClassId> {
        let payload = serde_json::to_vec(name).ok()?;
        self.with_host(None, |host| {
            let raw = host.call_buf_ret_i64("nimbus_find_class", &payload)?;
            Ok((raw > 0).then(|| ManagedClassId(raw as u64)))
        })
    }

    fn find_class_unqualified(&self, class_name: &str) -> Option<ManagedClassName> {
        self.with_host(None, |host| {
            let packed =
                host.call_buf_ret_i64("nimbus_find_class_unqualified", class_name.as_bytes())?;
            Ok(Self::read_json(host, packed))
        })
    }

    fn class_has_method(&self, class: ManagedClassId, method: StringName) -> bool {
        self.with_host(false, |host| {
            let flag = host.call_i64_buf_ret_i32(
                "nimbus_class_has_method",
                class.0 as i64,
                method.as_str().as_bytes(),
            )?;
            Ok(flag != 0)
        })
    }

    fn class_property_list(&self, class: ManagedClassId) -> Vec<PropertyInfo> {
        self.with_host(Vec::new(), |host| {
            let packed = host.call_i64_ret_i64("nimbus_class_property_list", class.0 as i64)?;
            let wires: Vec<WireProperty> = Self::read_json(host, packed).unwrap_or_default();
            Ok(wires.iter().map(property_from_wire).collect())
        })
    }

    fn class_signal_list(&self, class: ManagedClassId) -> Vec<MethodInfo> {
        self.with_host(Vec::new(), |host| {
            let packed = host.call_i64_ret_i64("nimbus_class_signal_list", class.0 as i64)?;
            let wires: Vec<WireMethod> = Self::read_json(host, packed).unwrap_or_default();
            Ok(wires.iter().map(method_from_wire).collect())
        })
    }

    fn class_method_list(&self, class: ManagedClassId) -> Vec<MethodInfo> {
        self.with_host(Vec::new(), |host| {
            let packed = host.call_i64_ret_i64("nimbus_class_method_list", class.0 as i64)?;
            let wires: Vec<WireMethod> = Self::read_json(host, packed).unwrap_or_default();
            Ok(wires.iter().map(method_from_wire).collect())
        })
    }

    fn class_is_tool(&self, class: ManagedClassId) -> bool {
        self.with_host(false, |host| {
            Ok(host.call_i64_ret_i32("nimbus_class_is_tool", class.0 as i64)? != 0)
        })
    }

    fn create_peer(&self, class: ManagedClassId, owner: EntityId) -> Result<GcHandle, InvokeError> {
        let mut host = self.host.lock().unwrap_or_else(|e| e.into_inner());
        let raw = host
            .call_i64_i64_ret_i64("nimbus_create_peer", class.0 as i64, owner.to_raw() as i64)
            .map_err(|e| InvokeError::Exception(e.to_string()))?;
        if raw == 0 {
            return Err(Self::invoke_failure(&mut host));
        }
        Ok(GcHandle(raw as u64))
    }

    fn dispose(&self, handle: GcHandle) {
        self.with_host((), |host| host.call_i64("nimbus_dispose", handle.0 as i64));
    }

    fn clear_native_pointer(&self, handle: GcHandle) {
        self.with_host((), |host| {
            host.call_i64("nimbus_clear_native_pointer", handle.0 as i64)
        });
    }

    fn upgrade(&self, handle: GcHandle) -> GcHandle {
        self.with_host(handle, |host| {
            Ok(GcHandle(
                host.call_i64_ret_i64("nimbus_upgrade", handle.0 as i64)? as u64,
            ))
        })
    }

    fn downgrade(&self, handle: GcHandle) -> GcHandle {
        self.with_host(handle, |host| {
            Ok(GcHandle(
                host.call_i64_ret_i64("nimbus_downgrade", handle.0 as i64)? as u64,
            ))
        })
    }

    fn is_released(&self, handle: GcHandle) -> bool {
        self.with_host(true, |host| {
            Ok(host.call_i64_ret_i32("nimbus_is_released", handle.0 as i64)? != 0)
        })
    }

    fn get_property(&self, handle: GcHandle, name: StringName) -> Option<Variant> {
        self.with_host(None, |host| {
            let packed = host.call_i64_buf_ret_i64(
                "nimbus_get_property",
                handle.0 as i64,
                name.as_str().as_bytes(),
            )?;
            let Some(encoded) = Self::read_json::<serde_json::Value>(host, packed) else {
                return Ok(None);
            };
            Ok(marshal::decode(&encoded).ok())
        })
    }

    fn set_property(&self, handle: GcHandle, name: StringName, value: &Variant) -> bool {
        let Ok(encoded) = marshal::encode(value) else {
            return false;
        };
        let Ok(payload) = serde_json::to_vec(&encoded) else {
            return false;
        };
        self.with_host(false, |host| {
            let flag = host.call_i64_buf2_ret_i32(
                "nimbus_set_property",
                handle.0 as i64,
                name.as_str().as_bytes(),
                &payload,
            )?;
            Ok(flag != 0)
        })
    }

    fn invoke(&self, handle: GcHandle, method: StringName, args: &[Variant]) -> InvokeResult {
        let Some(payload) = encode_args(args) else {
            return Err(InvokeError::Call(CallError::InvalidArgument {
                index: 0,
                expected: VariantKind::Nil,
            }));
        };
        let mut host = self.host.lock().unwrap_or_else(|e| e.into_inner());
        let packed = host
            .call_i64_buf2_ret_i64(
                "nimbus_invoke",
                handle.0 as i64,
                method.as_str().as_bytes(),
                &payload,
            )
            .map_err(|e| InvokeError::Exception(e.to_string()))?;
        if packed == 0 {
            return Err(Self::invoke_failure(&mut host));
        }
        let encoded: serde_json::Value = Self::read_json(&mut host, packed)
            .ok_or(InvokeError::Call(CallError::InstanceNull))?;
        marshal::decode(&encoded).map_err(|e| InvokeError::Exception(e.to_string()))
    }

    fn invoke_delegate(&self, delegate_id: u64, args: &[Variant]) -> InvokeResult {
        let Some(payload) = encode_args(args) else {
            return Err(InvokeError::Call(CallError::InvalidArgument {
                index: 0,
                expected: VariantKind::Nil,
            }));
        };
        let mut host = self.host.lock().unwrap_or_else(|e| e.into_inner());
        let packed = host
            .call_i64_buf_ret_i64("nimbus_invoke_delegate", delegate_id as i64, &payload)
            .map_err(|e| InvokeError::Exception(e.to_string()))?;
        if packed == 0 {
            return Err(Self::invoke_failure(&mut host));
        }
        let encoded: serde_json::Value = Self::read_json(&mut host, packed)
            .ok_or(InvokeError::Call(CallError::InstanceNull))?;
        marshal::decode(&encoded).map_err(|e| InvokeError::Exception(e.to_string()))
    }

    fn delegate_is_valid(&self, delegate_id: u64) -> bool {
        self.with_host(false, |host| {
            Ok(host.call_i64_ret_i32("nimbus_delegate_is_valid", delegate_id as i64)? != 0)
        })
    }

    fn serialize_delegate(&self, delegate_id: u64) -> Option<Vec<Variant>> {
        self.with_host(None, |host| {
            let packed =
                host.call_i64_ret_i64("nimbus_serialize_delegate", delegate_id as i64)?;
            let Some(values) = Self::read_json::<Vec<serde_json::Value>>(host, packed) else {
                return Ok(None);
            };
            Ok(values
                .iter()
                .map(|v| marshal::decode(v).ok())
                .collect::<Option<Vec<Variant>>>())
        })
    }

    fn deserialize_delegate(&self, data: &[Variant]) -> Option<u64> {
        let payload = encode_args(data)?;
        self.with_host(None, |host| {
            let raw = host.call_buf_ret_i64("nimbus_deserialize_delegate", &payload)?;
            Ok((raw > 0).then_some(raw as u64))
        })
    }

    fn collect_garbage(&self) {
        self.with_host((), |host| host.call_void("nimbus_collect_garbage"));
    }

    fn unload(&self) {
        self.with_host((), |host| host.call_void("nimbus_unload"));
    }

    fn frame(&self) {
        self.with_host((), |host| host.call_void("nimbus_frame"));
    }
}
