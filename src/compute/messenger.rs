use crate::graph::property_value::PropertyValue;
use crate::graph::VertexId;
use hashbrown::HashMap;

pub(crate) type Inboxes = HashMap<VertexId, Vec<PropertyValue>>;

/// Per-worker message port. Incoming messages are the ones addressed to the focused vertex in
/// the previous superstep; outgoing messages are buffered locally and committed by the computer
/// at the superstep barrier, so a send is never observable within the superstep that made it.
pub struct Messenger<'a> {
    vertex: VertexId,
    inboxes: &'a Inboxes,
    outbox: Vec<(VertexId, PropertyValue)>,
}

impl<'a> Messenger<'a> {
    pub(crate) fn new(inboxes: &'a Inboxes) -> Self {
        Self { vertex: 0, inboxes, outbox: Vec::new() }
    }

    pub(crate) fn focus(&mut self, vertex: VertexId) {
        self.vertex = vertex;
    }

    pub fn receive(&self) -> impl Iterator<Item = &PropertyValue> {
        self.inboxes.get(&self.vertex).into_iter().flatten()
    }

    pub fn send(&mut self, to: VertexId, message: PropertyValue) {
        self.outbox.push((to, message));
    }

    pub(crate) fn into_outbox(self) -> Vec<(VertexId, PropertyValue)> {
        self.outbox
    }
}
