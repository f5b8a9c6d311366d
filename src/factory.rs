use std::{fmt, marker::PhantomData};

use crate::{
  allocator::{Allocator, default_allocator, delete_object, new_object},
  error::AllocResult,
};

/// Destroys objects and returns their memory to wherever it came from.
pub trait Deleter<T> {
  /// # Safety
  ///
  /// `instance` must be null or an object this deleter is able to destroy
  /// (for allocator-backed deleters: created in memory from the matching
  /// allocator), and must not be used afterwards.
  unsafe fn delete_object(
    &self,
    instance: *mut T,
  );
}

/// Creates default-constructed objects that its `Deleter` half can destroy.
pub trait Factory<T>: Deleter<T> {
  fn create_object(&self) -> AllocResult<*mut T>;
}

/// A factory placing `T::default()` in memory from a borrowed allocator.
pub struct AllocatorFactory<'a, T> {
  allocator: &'a dyn Allocator,
  _marker: PhantomData<fn() -> T>,
}

impl<'a, T> AllocatorFactory<'a, T> {
  pub fn new(allocator: &'a dyn Allocator) -> Self {
    Self {
      allocator,
      _marker: PhantomData,
    }
  }

  pub fn allocator(&self) -> &'a dyn Allocator {
    self.allocator
  }
}

impl<T> Deleter<T> for AllocatorFactory<'_, T> {
  unsafe fn delete_object(
    &self,
    instance: *mut T,
  ) {
    unsafe { delete_object(self.allocator, instance) };
  }
}

impl<T: Default> Factory<T> for AllocatorFactory<'_, T> {
  fn create_object(&self) -> AllocResult<*mut T> {
    new_object(self.allocator, T::default())
  }
}

/// Deletes objects through the allocator given at construction, or through
/// the process default allocator when none was given.
///
/// The default allocator is looked up at deletion time, not at construction.
pub struct DefaultDeleter<'a, T> {
  allocator: Option<&'a dyn Allocator>,
  _marker: PhantomData<fn(*mut T)>,
}

impl<'a, T> DefaultDeleter<'a, T> {
  pub fn new() -> Self {
    Self {
      allocator: None,
      _marker: PhantomData,
    }
  }

  pub fn with_allocator(allocator: &'a dyn Allocator) -> Self {
    Self {
      allocator: Some(allocator),
      _marker: PhantomData,
    }
  }

  /// The allocator objects are returned to, resolving the default if needed.
  pub fn allocator(&self) -> &'a dyn Allocator {
    match self.allocator {
      Some(allocator) => allocator,
      None => default_allocator(),
    }
  }
}

impl<T> Default for DefaultDeleter<'_, T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Deleter<T> for DefaultDeleter<'_, T> {
  unsafe fn delete_object(
    &self,
    instance: *mut T,
  ) {
    if instance.is_null() {
      return;
    }
    unsafe { delete_object(self.allocator(), instance) };
  }
}

impl<T> fmt::Debug for DefaultDeleter<'_, T> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("DefaultDeleter")
      .field("uses_default_allocator", &self.allocator.is_none())
      .finish()
  }
}
