use std::fmt;

/// A rate-limited resource whose capacity can be reserved ahead of use.
///
/// Reserved units are eventually either submitted (consumed) or cancelled
/// (returned). Callers never submit or cancel more than they reserved.
pub trait RateController {
  fn reserve(
    &mut self,
    num_units: u64,
  );

  fn submit_reserved(
    &mut self,
    num_units: u64,
  );

  fn cancel_reserved(
    &mut self,
    num_units: u64,
  );
}

/// Reserves units from a rate controller for the duration of a scope.
///
/// Whatever has been neither submitted nor cancelled when the guard goes out
/// of scope is cancelled, whether the scope exits normally or by unwinding.
///
/// ```rust
/// use seqalloc::{RateController, ReservationGuard};
///
/// #[derive(Default)]
/// struct Bucket {
///   reserved: u64,
///   submitted: u64,
/// }
///
/// impl RateController for Bucket {
///   fn reserve(&mut self, n: u64) { self.reserved += n; }
///   fn submit_reserved(&mut self, n: u64) { self.reserved -= n; self.submitted += n; }
///   fn cancel_reserved(&mut self, n: u64) { self.reserved -= n; }
/// }
///
/// let mut bucket = Bucket::default();
/// {
///   let mut guard = ReservationGuard::new(&mut bucket, 10);
///   guard.submit_reserved(4);
/// }
/// assert_eq!(bucket.reserved, 0);
/// assert_eq!(bucket.submitted, 4);
/// ```
pub struct ReservationGuard<'a, T: RateController + ?Sized> {
  controller: &'a mut T,
  units_reserved: u64,
}

impl<'a, T: RateController + ?Sized> ReservationGuard<'a, T> {
  pub fn new(
    controller: &'a mut T,
    num_units: u64,
  ) -> Self {
    controller.reserve(num_units);
    Self {
      controller,
      units_reserved: num_units,
    }
  }

  /// Returns `num_units` of the reservation to the controller.
  pub fn cancel_reserved(
    &mut self,
    num_units: u64,
  ) {
    debug_assert!(
      num_units <= self.units_reserved,
      "cannot cancel {num_units} units, only {} reserved",
      self.units_reserved
    );
    self.controller.cancel_reserved(num_units);
    self.units_reserved -= num_units;
  }

  /// Consumes `num_units` of the reservation.
  pub fn submit_reserved(
    &mut self,
    num_units: u64,
  ) {
    debug_assert!(
      num_units <= self.units_reserved,
      "cannot submit {num_units} units, only {} reserved",
      self.units_reserved
    );
    self.controller.submit_reserved(num_units);
    self.units_reserved -= num_units;
  }

  /// Units still reserved by this guard.
  #[inline]
  pub fn units_reserved(&self) -> u64 {
    self.units_reserved
  }

  pub fn controller(&self) -> &T {
    &*self.controller
  }
}

impl<T: RateController + ?Sized> Drop for ReservationGuard<'_, T> {
  fn drop(&mut self) {
    if self.units_reserved != 0 {
      self.controller.cancel_reserved(self.units_reserved);
    }
  }
}

impl<T: RateController + ?Sized> fmt::Debug for ReservationGuard<'_, T> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("ReservationGuard")
      .field("units_reserved", &self.units_reserved)
      .finish_non_exhaustive()
  }
}
