//! Listener callables and their method identity.
//!
//! A listener is any `Fn` closure or function item taking between zero and eight arguments. The
//! argument list is modelled as a tuple, so a `Chain<(u32, &'static str)>` accepts listeners of
//! shape `Fn(u32, &'static str)` and a `Chain<()>` accepts `Fn()`.
//!
//! # Method identity
//!
//! Each listener records a [`MethodId`]. For closures and function items it is the concrete Rust
//! type of the callable. Every closure expression and every function item has its own type, so:
//!
//! - the same closure expression evaluated twice (say, in a loop or a helper) yields two
//!   listeners with the same method, even when they capture different state;
//! - two different closure expressions, or two different functions, never share a method.
//!
//! Type-erased callables share one type across all their targets, so they are identified by
//! target instead:
//!
//! - a function pointer (`fn(u32)`) by the address it points to;
//! - a `Box<dyn Fn(..) + Send + Sync>` or `&'static (dyn Fn(..) + Send + Sync)` by the object it
//!   points to.
//!
//! Any other wrapper that hides its target can be given an explicit identity with
//! [`Listener::with_method`], for example a fresh [`MethodId::unique`].
//!
//! The cleanup pass uses this to keep at most one subscription per host and method.

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    ptr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

static NEXT_UNIQUE: AtomicU64 = AtomicU64::new(1);

/// What a [`MethodId`] distinguishes callables by, on top of their type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    /// The type alone.
    Type,
    /// The erased object: data address plus a fingerprint of the full pointer, so zero-sized
    /// objects sharing an address still differ by vtable.
    Object { address: usize, fingerprint: u64 },
    /// Minted by [`MethodId::unique`].
    Unique(u64),
}

/// Identity of the code a listener runs, independent of any captured state.
#[derive(Clone, Copy)]
pub struct MethodId {
    type_id: TypeId,
    target: Target,
    name: &'static str,
}

impl MethodId {
    /// The method identity of callable type `F`.
    #[inline]
    pub fn of<F: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            target: Target::Type,
            name: type_name::<F>(),
        }
    }

    /// The method identity of an erased callable of type `F` pointing at `target`.
    pub fn at<F: 'static, T: ?Sized>(target: *const T) -> Self {
        let mut hasher = DefaultHasher::new();
        ptr::hash(target, &mut hasher);
        Self {
            type_id: TypeId::of::<F>(),
            target: Target::Object {
                address: target.cast::<()>() as usize,
                fingerprint: hasher.finish(),
            },
            name: type_name::<F>(),
        }
    }

    /// A method identity equal to no other.
    pub fn unique() -> Self {
        Self {
            type_id: TypeId::of::<Self>(),
            target: Target::Unique(NEXT_UNIQUE.fetch_add(1, Ordering::Relaxed)),
            name: "unique",
        }
    }

    /// Type name of the callable, for diagnostics only.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MethodId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.target == other.target
    }
}

impl Eq for MethodId {}

impl Hash for MethodId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.target.hash(state);
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Target::Type => f.write_str(self.name),
            Target::Object { address, .. } => write!(f, "{}@{address:#x}", self.name),
            Target::Unique(n) => write!(f, "unique#{n}"),
        }
    }
}

/// A callable that can be invoked with an argument tuple.
///
/// You don't implement this trait manually. It's implemented by macros for every
/// `Fn() + Send + Sync + 'static` up to `Fn(A, B, C, D, E, F, G, H)`.
pub trait Callable<Args>: Send + Sync + 'static {
    /// Invoke the callable, spreading the tuple into positional arguments.
    fn call(&self, args: Args);

    /// The method identity of this callable.
    fn method(&self) -> MethodId;
}

/// Resolve the method identity of `$callable`, looking through the erased callable types of its
/// signature.
macro_rules! resolve_method {
    ($callable:expr, $func:ty, ($($param:ident),*)) => {{
        let any: &dyn Any = $callable;
        if let Some(pointer) = any.downcast_ref::<fn($($param),*)>() {
            MethodId::at::<$func, ()>(*pointer as *const ())
        } else if let Some(boxed) = any.downcast_ref::<Box<dyn Fn($($param),*) + Send + Sync>>() {
            MethodId::at::<$func, _>(&**boxed as *const (dyn Fn($($param),*) + Send + Sync))
        } else if let Some(borrowed) =
            any.downcast_ref::<&'static (dyn Fn($($param),*) + Send + Sync)>()
        {
            MethodId::at::<$func, _>(*borrowed as *const (dyn Fn($($param),*) + Send + Sync))
        } else {
            MethodId::of::<$func>()
        }
    }};
}

impl<Func> Callable<()> for Func
where
    Func: Fn() + Send + Sync + 'static,
{
    #[inline]
    fn call(&self, _args: ()) {
        self();
    }

    fn method(&self) -> MethodId {
        resolve_method!(self, Func, ())
    }
}

macro_rules! callable_function {
    ($($param:ident),*) => {
        impl<Func, $($param: 'static, )*> Callable<($($param, )*)> for Func
        where
            Func: Fn($($param),*) + Send + Sync + 'static,
        {
            #[inline]
            fn call(&self, args: ($($param, )*)) {
                #[allow(non_snake_case)]
                let ($($param,)*) = args;
                self($($param),*);
            }

            fn method(&self) -> MethodId {
                resolve_method!(self, Func, ($($param),*))
            }
        }
    };
}

all_arities!(callable_function);

/// A type-erased listener and its method identity.
///
/// Cloning a listener is cheap and keeps the same method identity.
pub struct Listener<Args> {
    method: MethodId,
    callable: Arc<dyn Callable<Args>>,
}

impl<Args: 'static> Listener<Args> {
    /// Wrap a callable, recording its method identity.
    pub fn new<F: Callable<Args>>(callable: F) -> Self {
        Self::with_method(callable.method(), callable)
    }

    /// Wrap a callable under an explicit method identity.
    pub fn with_method<F: Callable<Args>>(method: MethodId, callable: F) -> Self {
        Self {
            method,
            callable: Arc::new(callable),
        }
    }

    /// The method identity of this listener.
    #[inline]
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// Whether both listeners run the same code.
    #[inline]
    pub fn same_method(&self, other: &Listener<Args>) -> bool {
        self.method == other.method
    }

    /// Invoke the listener.
    #[inline]
    pub fn call(&self, args: Args) {
        self.callable.call(args);
    }
}

impl<Args> Clone for Listener<Args> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            callable: Arc::clone(&self.callable),
        }
    }
}

impl<Args> fmt::Debug for Listener<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("method", &self.method)
            .finish()
    }
}
