//! Scoped access statements. `viewing`/`hijacking` are compile-time aliasing
//! disciplines with no runtime footprint; `inspecting`/`seizing` wrap the
//! body in external lock runtime calls, released on every exit edge.
use crate::ast::ScopedAccess;

use super::error::CodegenResult;
use super::types::IrType;
use super::{Emitter, LockRelease};

impl Emitter {
    /// `viewing s as h { … }` / `hijacking s as h { … }`: bind the handle to
    /// an alias of the source. The semantic analyzer enforces the aliasing
    /// rules; nothing is emitted beyond the alias itself.
    pub(crate) fn emit_viewing(
        &mut self,
        access: &ScopedAccess,
        exclusive: bool,
    ) -> CodegenResult<bool> {
        let source = self.emit_expression(&access.source)?;
        let source_ptr = self.spill_to_pointer(&source, &access.location)?;

        let handle = &access.handle;
        let kind = if exclusive { "hijacking" } else { "viewing" };
        let note = if exclusive {
            "exclusive, source paused"
        } else {
            "read-only"
        };
        self.comment(format!("{kind} {handle} = {} ({note}) {{", source.ty.source));
        self.line(format!("%{handle} = bitcast ptr {source_ptr} to ptr"));

        let handle_ty = IrType::new("ptr", false, false, source.ty.source.clone());
        self.temp_types
            .insert(format!("%{handle}"), handle_ty.clone());
        self.symbols.push_frame();
        self.symbols.bind_parameter(handle, handle_ty);

        let terminated = self.emit_statements(&access.body);

        self.symbols.pop_frame();
        let terminated = terminated?;
        self.comment(format!("}} {kind} {handle}"));
        Ok(terminated)
    }

    /// `inspecting s as h { … }` / `seizing s as h { … }`: acquire the lock,
    /// bind the handle to what the runtime hands back, release after the
    /// body. A `return` inside the body releases through the lock cleanup
    /// stack before leaving.
    pub(crate) fn emit_locked_access(
        &mut self,
        access: &ScopedAccess,
        lock_symbol: &str,
        unlock_symbol: &str,
    ) -> CodegenResult<bool> {
        let source = self.emit_expression(&access.source)?;
        let source_ptr = self.spill_to_pointer(&source, &access.location)?;

        self.declare(lock_symbol, &format!("declare ptr @{lock_symbol}(ptr)"));
        self.declare(
            unlock_symbol,
            &format!("declare void @{unlock_symbol}(ptr)"),
        );

        let handle = &access.handle;
        let kind = if lock_symbol.contains("rwlock") {
            "inspecting"
        } else {
            "seizing"
        };
        self.comment(format!("{kind} {handle} = {} {{", source.ty.source));
        self.line(format!(
            "%{handle} = call ptr @{lock_symbol}(ptr {source_ptr})"
        ));

        let handle_ty = IrType::new("ptr", false, false, source.ty.source.clone());
        self.temp_types
            .insert(format!("%{handle}"), handle_ty.clone());
        self.symbols.push_frame();
        self.symbols.bind_parameter(handle, handle_ty);
        self.lock_stack.push(LockRelease {
            unlock_symbol: unlock_symbol.to_owned(),
            source: source_ptr.clone(),
        });

        let terminated = self.emit_statements(&access.body);

        self.lock_stack.pop();
        self.symbols.pop_frame();
        let terminated = terminated?;
        if !terminated {
            self.line(format!("call void @{unlock_symbol}(ptr {source_ptr})"));
        }
        self.comment(format!("}} {kind} {handle}"));
        Ok(terminated)
    }
}
