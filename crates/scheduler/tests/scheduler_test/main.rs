/// Integration tests for the scheduler facade covering ordering, recurrence,
/// cancellation, failure isolation, shutdown, and status observers.

mod cancellation;
mod failures;
mod helpers;
mod recurring;
mod shutdown;
