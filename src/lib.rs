// Copyright 2025 proxyweave contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # proxyweave
//!
//! A generic interception and proxy-dispatch framework. `proxyweave` produces
//! runtime proxies that route calls to a target object through ordered chains
//! of cross-cutting advice, selected per operation by pointcut matching —
//! without any runtime code generation or reflection.
//!
//! ## Features
//!
//! - **Explicit operation model** - call surfaces are registered up front as
//!   invoker closures; no type introspection at dispatch time
//! - **Four advice kinds** - around, before, after-returning, and throws
//!   advice, all normalized into one uniform interceptor chain
//! - **Pointcut matching** - static matching cached per operation, dynamic
//!   matching re-evaluated per call against the live arguments
//! - **Two dispatch strategies** - interface composition and base-type
//!   extension (with documented pass-through of non-overridable members)
//! - **Output parameters and generics** - argument records with explicit
//!   `In`/`InOut`/`Out` slots; generic instantiations resolved independently
//! - **Concurrent by design** - lock-free chain and shape caches, freeze
//!   semantics for administrative advisor changes
//! - **Binary snapshots** - serializable proxies round-trip through a tagged
//!   envelope and a restore-time codec
//!
//! ## Quick Start
//!
//! ```rust
//! use proxyweave::prelude::*;
//! use std::sync::Arc;
//!
//! struct Greeter;
//!
//! let declaring = TypeKey::new("IGreeter");
//! let sig = OperationSig::new(declaring.clone(), "greet", vec![ParamSpec::input("name")]);
//! let surface = OperationSurface::builder(declaring.clone())
//!     .operation(OperationDescriptor::bind::<Greeter, _>(sig.clone(), |_, _, args| {
//!         let name: &String = args.expect(0, "IGreeter.greet")?;
//!         Ok(ret(format!("hello, {name}")))
//!     }))
//!     .build()?;
//!
//! let mut config = ProxyConfig::new();
//! config.set_target(TypeKey::new("Greeter"), Arc::new(Greeter));
//! config.add_surface(surface);
//! config.add_advice(Advice::Around(Arc::new(FnInterceptor::new(|ctx| {
//!     // wrap the call: rewrite arguments, observe results, retry...
//!     ctx.proceed()
//! }))))?;
//!
//! let proxy = create_dispatcher(&config)?;
//! let mut args = ArgList::for_sig(&sig);
//! args.set(0, "world".to_string());
//! let reply = proxy.invoke(&declaring, "greet", &mut args)?;
//! assert_eq!(*reply.downcast::<String>().unwrap(), "hello, world");
//! # Ok::<(), proxyweave::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - re-exports of the commonly used types
//! - [`operation`] - operation signatures, surfaces, and invokers
//! - [`pointcut`] - static and dynamic match predicates
//! - [`advice`] - advice traits and the uniform interceptor adapters
//! - [`advisor`] - pointcut/advice pairs and the ordered, freezable registry
//! - [`chain`] - per-operation chain construction and caching
//! - [`invocation`] - per-call context and the proceed protocol
//! - [`target`] - target-source indirection
//! - [`config`] / [`factory`] / [`dispatch`] - configuration, strategy
//!   selection, blueprint caching, and the live dispatcher
//! - [`snapshot`] - the binary serialization boundary
//! - [`Error`] and [`Result`] - comprehensive error handling

pub mod advice;
pub mod advisor;
pub mod chain;
pub mod config;
pub mod dispatch;
mod error;
pub mod factory;
pub mod invocation;
pub mod operation;
pub mod pointcut;
pub mod prelude;
pub mod snapshot;
pub mod target;

pub use error::{Error, Fault};

/// The result type used throughout proxyweave.
pub type Result<T> = std::result::Result<T, Error>;
