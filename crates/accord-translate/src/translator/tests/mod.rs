//! Tests for directive translation.

mod helpers;
