//! Client mount boundary
//!
//! The client renders the synchronized body inside one wrapper element under
//! its own `<body>`. Server-space addresses gain that wrapper segment right
//! after `body` on the way in, and lose it on the way out.

use dynaser_dom::{Address, Segment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub segment: Segment,
}

impl Default for MountPoint {
    fn default() -> Self {
        Self {
            segment: Segment::new("div", 1),
        }
    }
}

fn body_prefix() -> Address {
    Address::new(vec![Segment::new("html", 1), Segment::new("body", 1)])
}

impl MountPoint {
    pub fn new(segment: Segment) -> Self {
        Self { segment }
    }

    /// Client-space address of the wrapper element
    pub fn mount_address(&self) -> Address {
        body_prefix().child(self.segment.clone())
    }

    /// Server-space to client-space; `None` when the address is not under `html>body`
    pub fn to_client(&self, server: &Address) -> Option<Address> {
        if !server.starts_with(&body_prefix()) {
            return None;
        }
        let mut segments = server.segments.clone();
        segments.insert(2, self.segment.clone());
        Some(Address::new(segments))
    }

    /// Client-space to server-space; `None` when the address is not under the mount
    pub fn to_server(&self, client: &Address) -> Option<Address> {
        if !client.starts_with(&self.mount_address()) {
            return None;
        }
        let mut segments = client.segments.clone();
        segments.remove(2);
        Some(Address::new(segments))
    }
}
