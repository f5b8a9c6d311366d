//! Scoped destruction of objects living in memory the guard does not own.
//!
//! The guards are for objects written into raw allocator memory, where no
//! owning Rust value exists to run `Drop`. Each guard destroys its object at
//! most once, on every exit path including unwinding.

use std::{marker::PhantomData, ptr};

use crate::factory::Deleter;

/// Unconditionally drops the guarded object in place at the end of scope.
/// The object's memory is left alone.
pub struct DestructorGuard<T> {
  object: *mut T,
  _marker: PhantomData<T>,
}

impl<T> DestructorGuard<T> {
  /// # Safety
  ///
  /// `object` must point to a live, initialized `T` that nothing else will
  /// drop, and must stay valid until the guard goes out of scope.
  pub unsafe fn new(object: *mut T) -> Self {
    debug_assert!(!object.is_null(), "a destructor guard needs an object");
    Self {
      object,
      _marker: PhantomData,
    }
  }
}

impl<T> Drop for DestructorGuard<T> {
  fn drop(&mut self) {
    unsafe { ptr::drop_in_place(self.object) };
  }
}

/// Drops the managed object in place at the end of scope unless released.
pub struct AutoScalarDestructor<T> {
  object: *mut T,
  _marker: PhantomData<T>,
}

impl<T> AutoScalarDestructor<T> {
  /// Manages `object`; a null `object` starts the guard released.
  ///
  /// # Safety
  ///
  /// Same contract as [`DestructorGuard::new`] for a non-null `object`.
  pub unsafe fn new(object: *mut T) -> Self {
    Self {
      object,
      _marker: PhantomData,
    }
  }

  /// Stops managing the object, which will not be dropped by this guard.
  pub fn release(&mut self) {
    self.object = ptr::null_mut();
  }

  /// Manages `object` instead of the current one, which is not dropped.
  ///
  /// # Safety
  ///
  /// Same contract as [`DestructorGuard::new`] for a non-null `object`.
  pub unsafe fn reset(
    &mut self,
    object: *mut T,
  ) {
    self.object = object;
  }

  pub fn is_managing(&self) -> bool {
    !self.object.is_null()
  }
}

impl<T> Drop for AutoScalarDestructor<T> {
  fn drop(&mut self) {
    if !self.object.is_null() {
      unsafe { ptr::drop_in_place(self.object) };
    }
  }
}

/// Hands the managed object to a deleter at the end of scope, which both
/// destroys it and frees its memory, unless released first.
pub struct DeleterGuard<'d, T, D: Deleter<T> + ?Sized> {
  object: *mut T,
  deleter: &'d D,
}

impl<'d, T, D: Deleter<T> + ?Sized> DeleterGuard<'d, T, D> {
  /// # Safety
  ///
  /// `object` must be null or satisfy the contract of
  /// `deleter.delete_object`, and nothing else may delete it while the guard
  /// manages it.
  pub unsafe fn new(
    object: *mut T,
    deleter: &'d D,
  ) -> Self {
    Self { object, deleter }
  }

  /// Stops managing the object and returns it to the caller.
  pub fn release(&mut self) -> *mut T {
    std::mem::replace(&mut self.object, ptr::null_mut())
  }

  pub fn is_managing(&self) -> bool {
    !self.object.is_null()
  }
}

impl<T, D: Deleter<T> + ?Sized> Drop for DeleterGuard<'_, T, D> {
  fn drop(&mut self) {
    if !self.object.is_null() {
      unsafe { self.deleter.delete_object(self.object) };
    }
  }
}
