// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of one update to one chat.
//!
//! Media futures are awaited first; a failed future drops that item but
//! never the update. Messages go out strictly sequentially for the target
//! chat: text pages, then media albums. Any transport error propagates so
//! the driver can suspend the subscription.

use fanline_core::{ChatId, FanlineError, Update};
use tracing::{debug, warn};

use crate::engine::Engine;

/// Platform album size limit.
pub(crate) const ALBUM_LIMIT: usize = 10;

impl Engine {
    /// Deliver one update to one chat.
    pub async fn send_update(
        &self,
        chat_id: ChatId,
        update: Update,
    ) -> Result<(), FanlineError> {
        let Update {
            offset,
            text,
            media,
            ..
        } = update;

        let mut resolved = Vec::new();
        for future in media {
            let url = future.url().to_string();
            match future.resolve().await {
                Ok(media_ref) => resolved.push(media_ref),
                Err(e) => {
                    warn!(chat = %chat_id, url = %url, error = %e, "dropping failed media");
                }
            }
        }

        for page in text.iter().filter(|page| !page.is_empty()) {
            self.inner.chat.send_text(chat_id, page, None).await?;
        }
        for album in resolved.chunks(ALBUM_LIMIT) {
            self.inner.chat.send_album(chat_id, album).await?;
        }

        debug!(chat = %chat_id, offset, "update delivered");
        Ok(())
    }
}
