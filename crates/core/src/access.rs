//! Sequential access policy.

use crate::error::Result;
use crate::id::ImageId;
use crate::session::SessionInstance;

/// Whether `item` may be viewed or acted on.
///
/// An item is reachable once every item with a lower sequence number is
/// handled. Evaluated against current state on every call; linear in the
/// size of the set.
pub fn can_access(instance: &SessionInstance, item: ImageId) -> Result<bool> {
    let seq_no = instance.item(item)?.seq_no();
    Ok(instance
        .items()
        .filter(|(_, progress)| progress.seq_no() < seq_no)
        .all(|(_, progress)| progress.is_handled()))
}
