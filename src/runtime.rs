// runtime-tokio
#[cfg(feature = "runtime-tokio")]
pub type Mutex<T> = tokio::sync::Mutex<T>;

#[cfg(feature = "runtime-tokio")]
pub use tokio::task::yield_now;

// runtime-async-std
#[cfg(all(feature = "runtime-async-std", not(feature = "runtime-tokio")))]
pub type Mutex<T> = async_std::sync::Mutex<T>;

#[cfg(all(feature = "runtime-async-std", not(feature = "runtime-tokio")))]
pub use async_std::task::yield_now;

#[cfg(not(any(feature = "runtime-async-std", feature = "runtime-tokio")))]
compile_error!("enable one of the `runtime-async-std` or `runtime-tokio` features");
