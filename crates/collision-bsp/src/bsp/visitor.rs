//! Visitor protocol for collision queries.
//!
//! Visitors let callers decide which candidate hits count without the query
//! algorithms knowing about "all hits", "nearest hit" or "first hit of some
//! kind" policies.

use crate::WorldTriangle;

bitflags::bitflags! {
    /// What a visitor wants the query to do after seeing a candidate hit.
    ///
    /// - `WANT_CLOSER` only: accept this hit and keep looking for closer ones.
    /// - `WANT_FARTHER` (alone or with `WANT_CLOSER`): reject this hit and keep searching.
    /// - empty: accept this hit and stop the query.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct HitResponse: u8 {
        /// Still interested in hits closer than this one.
        const WANT_CLOSER  = 0b0000_0001;
        /// Still interested in hits farther than this one.
        const WANT_FARTHER = 0b0000_0010;
    }
}

impl HitResponse {
    /// Keep searching everything.
    pub const CONTINUE: Self = Self::all();
    /// Accept the hit and end the query.
    pub const STOP: Self = Self::empty();

    /// Returns true if the hit this response answers should be kept.
    #[inline]
    pub fn accepts(self) -> bool {
        !self.contains(Self::WANT_FARTHER)
    }

    /// Returns true if the query should end immediately.
    #[inline]
    pub fn stops(self) -> bool {
        self.is_empty()
    }
}

/// Callback invoked once per candidate triangle hit by an interval or swept query.
///
/// `fraction` is the position of the hit along the queried segment (0 at the
/// start, 1 at the end); swept queries always report 0.
pub trait CollisionVisitor {
    /// Decides what to do with a candidate hit.
    fn visit(&mut self, triangle: &WorldTriangle, fraction: f32) -> HitResponse;
}

/// Accepts every hit and keeps looking for closer ones, yielding the nearest hit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullVisitor;

impl CollisionVisitor for NullVisitor {
    fn visit(&mut self, _triangle: &WorldTriangle, _fraction: f32) -> HitResponse {
        HitResponse::WANT_CLOSER
    }
}

/// Records every candidate hit and keeps searching.
#[derive(Debug, Default)]
pub struct CollectingVisitor {
    hits: Vec<(WorldTriangle, f32)>,
}

impl CollectingVisitor {
    /// Creates a new empty collecting visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected `(triangle, fraction)` pairs in visit order.
    pub fn hits(&self) -> &[(WorldTriangle, f32)] {
        &self.hits
    }

    /// Consumes the visitor, returning the collected hits.
    pub fn into_hits(self) -> Vec<(WorldTriangle, f32)> {
        self.hits
    }
}

impl CollisionVisitor for CollectingVisitor {
    fn visit(&mut self, triangle: &WorldTriangle, fraction: f32) -> HitResponse {
        self.hits.push((*triangle, fraction));
        HitResponse::CONTINUE
    }
}

/// A visitor that calls a closure for each candidate hit.
pub struct FnVisitor<F>
where
    F: FnMut(&WorldTriangle, f32) -> HitResponse,
{
    func: F,
}

impl<F> FnVisitor<F>
where
    F: FnMut(&WorldTriangle, f32) -> HitResponse,
{
    /// Creates a new visitor from a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> CollisionVisitor for FnVisitor<F>
where
    F: FnMut(&WorldTriangle, f32) -> HitResponse,
{
    fn visit(&mut self, triangle: &WorldTriangle, fraction: f32) -> HitResponse {
        (self.func)(triangle, fraction)
    }
}

impl<V: CollisionVisitor + ?Sized> CollisionVisitor for &mut V {
    fn visit(&mut self, triangle: &WorldTriangle, fraction: f32) -> HitResponse {
        (**self).visit(triangle, fraction)
    }
}
