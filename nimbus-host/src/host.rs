// WasmHost: manages the wasmtime engine, store, and guest instance.
//
// The guest is a managed assembly compiled to wasm32. All values cross the
// boundary as JSON in guest linear memory; a (ptr, len) pair packs into one
// i64 with ptr in the high half, and 0 means "nothing".

use wasmtime::*;

/// State accessible from within host functions via `Caller<HostState>`.
pub struct HostState {
    /// WASM linear memory, set after instantiation.
    pub memory: Option<Memory>,
}

/// iOS: Cranelift compiles to Pulley bytecode, Pulley interprets at runtime.
/// Other platforms: Cranelift compiles to native code, direct execution.
fn create_engine() -> wasmtime::Result<Engine> {
    #[allow(unused_mut)]
    let mut config = Config::new();
    #[cfg(target_os = "ios")]
    config.target("pulley64")?;
    Engine::new(&config)
}

pub fn pack(ptr: u32, len: u32) -> i64 {
    ((ptr as i64) << 32) | len as i64
}

pub fn unpack(packed: i64) -> Option<(u32, u32)> {
    if packed == 0 {
        return None;
    }
    Some(((packed >> 32) as u32, packed as u32))
}

pub struct WasmHost {
    store: Store<HostState>,
    instance: Instance,
}

impl WasmHost {
    /// Compile and instantiate the guest module. Runs on a dedicated thread
    /// with a large stack; Cranelift compilation overflows the default one
    /// on some platforms.
    pub fn new(wasm_bytes: &[u8]) -> Result<Self> {
        let bytes = wasm_bytes.to_vec();
        std::thread::Builder::new()
            .name("wasm-init".into())
            .stack_size(16 * 1024 * 1024)
            .spawn(move || Self::do_new(&bytes))
            .expect("failed to spawn wasm-init thread")
            .join()
            .map_err(|_| Error::msg("wasm-init thread panicked"))?
    }

    fn do_new(wasm_bytes: &[u8]) -> Result<Self> {
        let engine = create_engine()?;
        tracing::info!("compiling managed guest module");
        let module = Module::new(&engine, wasm_bytes)?;

        let mut linker = Linker::new(&engine);
        crate::host_calls::register_host_functions(&mut linker)?;

        let state = HostState { memory: None };
        let mut store = Store::new(&engine, state);
        let instance = linker.instantiate(&mut store, &module)?;

        if let Some(Extern::Memory(mem)) = instance.get_export(&mut store, "memory") {
            store.data_mut().memory = Some(mem);
        }

        Ok(WasmHost { store, instance })
    }

    /// Guest initialization: `__wasm_call_ctors` (if present), then
    /// `nimbus_guest_init`.
    pub fn call_init(&mut self) -> Result<()> {
        if let Ok(ctor) = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, "__wasm_call_ctors")
        {
            ctor.call(&mut self.store, ())?;
        }
        let init = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, "nimbus_guest_init")?;
        init.call(&mut self.store, ())?;
        Ok(())
    }

    // --- guest memory -----------------------------------------------------

    /// Read the bytes behind a packed (ptr, len) the guest returned.
    pub fn read_packed(&mut self, packed: i64) -> Option<Vec<u8>> {
        let (ptr, len) = unpack(packed)?;
        let memory = self.store.data().memory?;
        let data = memory.data(&self.store);
        let start = ptr as usize;
        let end = start.saturating_add(len as usize);
        if end > data.len() {
            return None;
        }
        Some(data[start..end].to_vec())
    }

    pub fn read_packed_str(&mut self, packed: i64) -> Option<String> {
        String::from_utf8(self.read_packed(packed)?).ok()
    }

    /// Copy bytes into a guest buffer allocated through `nimbus_alloc`.
    pub fn write_guest(&mut self, bytes: &[u8]) -> Result<(i32, i32)> {
        let alloc = self
            .instance
            .get_typed_func::<i32, i32>(&mut self.store, "nimbus_alloc")?;
        let ptr = alloc.call(&mut self.store, bytes.len() as i32)?;
        let memory = self
            .store
            .data()
            .memory
            .ok_or_else(|| Error::msg("guest exports no memory"))?;
        let data = memory.data_mut(&mut self.store);
        let start = ptr as usize;
        let end = start
            .checked_add(bytes.len())
            .filter(|end| *end <= data.len())
            .ok_or_else(|| Error::msg("guest allocation out of bounds"))?;
        data[start..end].copy_from_slice(bytes);
        Ok((ptr, bytes.len() as i32))
    }

    // --- typed export wrappers --------------------------------------------

    pub fn call_void(&mut self, name: &str) -> Result<()> {
        let func = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, name)?;
        func.call(&mut self.store, ())
    }

    pub fn call_ret_i64(&mut self, name: &str) -> Result<i64> {
        let func = self
            .instance
            .get_typed_func::<(), i64>(&mut self.store, name)?;
        func.call(&mut self.store, ())
    }

    pub fn call_ret_i32(&mut self, name: &str) -> Result<i32> {
        let func = self
            .instance
            .get_typed_func::<(), i32>(&mut self.store, name)?;
        func.call(&mut self.store, ())
    }

    pub fn call_i64(&mut self, name: &str, a: i64) -> Result<()> {
        let func = self
            .instance
            .get_typed_func::<i64, ()>(&mut self.store, name)?;
        func.call(&mut self.store, a)
    }

    pub fn call_i64_ret_i64(&mut self, name: &str, a: i64) -> Result<i64> {
        let func = self
            .instance
            .get_typed_func::<i64, i64>(&mut self.store, name)?;
        func.call(&mut self.store, a)
    }

    pub fn call_i64_ret_i32(&mut self, name: &str, a: i64) -> Result<i32> {
        let func = self
            .instance
            .get_typed_func::<i64, i32>(&mut self.store, name)?;
        func.call(&mut self.store, a)
    }

    pub fn call_buf_ret_i64(&mut self, name: &str, buf: &[u8]) -> Result<i64> {
        let (ptr, len) = self.write_guest(buf)?;
        let func = self
            .instance
            .get_typed_func::<(i32, i32), i64>(&mut self.store, name)?;
        func.call(&mut self.store, (ptr, len))
    }

    pub fn call_i64_buf_ret_i64(&mut self, name: &str, a: i64, buf: &[u8]) -> Result<i64> {
        let (ptr, len) = self.write_guest(buf)?;
        let func = self
            .instance
            .get_typed_func::<(i64, i32, i32), i64>(&mut self.store, name)?;
        func.call(&mut self.store, (a, ptr, len))
    }

    pub fn call_i64_buf_ret_i32(&mut self, name: &str, a: i64, buf: &[u8]) -> Result<i32> {
        let (ptr, len) = self.write_guest(buf)?;
        let func = self
            .instance
            .get_typed_func::<(i64, i32, i32), i32>(&mut self.store, name)?;
        func.call(&mut self.store, (a, ptr, len))
    }

    pub fn call_i64_i64_ret_i64(&mut self, name: &str, a: i64, b: i64) -> Result<i64> {
        let func = self
            .instance
            .get_typed_func::<(i64, i64), i64>(&mut self.store, name)?;
        func.call(&mut self.store, (a, b))
    }

    pub fn call_i64_buf2_ret_i64(
        &mut self,
        name: &str,
        a: i64,
        first: &[u8],
        second: &[u8],
    ) -> Result<i64> {
        let (p1, l1) = self.write_guest(first)?;
        let (p2, l2) = self.write_guest(second)?;
        let func = self
            .instance
            .get_typed_func::<(i64, i32, i32, i32, i32), i64>(&mut self.store, name)?;
        func.call(&mut self.store, (a, p1, l1, p2, l2))
    }

    pub fn call_i64_buf2_ret_i32(
        &mut self,
        name: &str,
        a: i64,
        first: &[u8],
        second: &[u8],
    ) -> Result<i32> {
        let (p1, l1) = self.write_guest(first)?;
        let (p2, l2) = self.write_guest(second)?;
        let func = self
            .instance
            .get_typed_func::<(i64, i32, i32, i32, i32), i32>(&mut self.store, name)?;
        func.call(&mut self.store, (a, p1, l1, p2, l2))
    }
}

// ---------------------------------------------------------------------------
// Guest memory helpers for host functions
// ---------------------------------------------------------------------------

/// Read bytes from guest linear memory inside a host function.
pub fn read_guest_bytes(caller: &Caller<'_, HostState>, ptr: u32, len: u32) -> Vec<u8> {
    let Some(memory) = caller.data().memory else {
        return Vec::new();
    };
    let data = memory.data(caller);
    let start = ptr as usize;
    let end = start.saturating_add(len as usize);
    if end > data.len() {
        return Vec::new();
    }
    data[start..end].to_vec()
}

/// Write bytes into a guest-provided buffer inside a host function.
pub fn write_guest_bytes(caller: &mut Caller<'_, HostState>, ptr: u32, bytes: &[u8]) {
    let Some(memory) = caller.data().memory else {
        return;
    };
    let data = memory.data_mut(caller);
    let start = ptr as usize;
    let end = start.saturating_add(bytes.len());
    if end <= data.len() {
        data[start..end].copy_from_slice(bytes);
    }
}
