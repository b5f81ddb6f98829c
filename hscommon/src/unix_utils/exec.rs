// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libc::execve;
use nix::errno::Errno;
use std::ffi::CString;
use thiserror::Error;

// The *_storage fields are just storage: they keep the CStrings alive
// behind the NULL-terminated pointer arrays execve consumes.
#[allow(dead_code)]
#[derive(Debug)]
pub struct PreparedExec {
    program: CString,
    arg_storage: Vec<CString>,
    arg_ptrs: Vec<*const libc::c_char>,
    env_storage: Vec<CString>,
    env_ptrs: Vec<*const libc::c_char>,
}

#[derive(Debug, Error)]
pub enum PreparedExecError {
    #[error("program path contains a NUL byte")]
    Program(#[source] std::ffi::NulError),
    #[error("argument contains a NUL byte")]
    Argument(#[source] std::ffi::NulError),
    #[error("environment entry contains a NUL byte")]
    Environment(#[source] std::ffi::NulError),
}

impl PreparedExec {
    /// Lays out argv and envp for `execve` ahead of time, so the child
    /// performs no fallible allocation between fork and exec.
    pub fn new(
        program: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<Self, PreparedExecError> {
        let program = CString::new(program).map_err(PreparedExecError::Program)?;

        let arg_storage: Vec<CString> = args
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<_, _>>()
            .map_err(PreparedExecError::Argument)?;
        let arg_ptrs: Vec<*const libc::c_char> = arg_storage
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        let env_storage: Vec<CString> = env
            .iter()
            .map(|(key, value)| CString::new(format!("{key}={value}")))
            .collect::<Result<_, _>>()
            .map_err(PreparedExecError::Environment)?;
        let env_ptrs: Vec<*const libc::c_char> = env_storage
            .iter()
            .map(|entry| entry.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        Ok(Self {
            program,
            arg_storage,
            arg_ptrs,
            env_storage,
            env_ptrs,
        })
    }

    /// Replaces the process image. Only returns on failure, with the errno.
    pub fn exec(&self) -> Errno {
        // Safety: the only way to construct one of these is through `new`,
        // which guarantees NUL-terminated storage behind NULL-terminated
        // pointer arrays.
        unsafe {
            execve(
                self.program.as_ptr(),
                self.arg_ptrs.as_ptr(),
                self.env_ptrs.as_ptr(),
            );
        }
        Errno::last()
    }
}
