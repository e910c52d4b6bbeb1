//! Background texture loading.

use std::path::{Path, PathBuf};
use std::thread;

use crate::events::{EventSender, HostMessage, TextureLoad};
use crate::ids::TextureId;
use crate::scene_graph::{SceneGraph, TextureState};

/// Reads texture files on worker threads and reports back through the
/// message queue.
pub struct AssetLoader {
    sender: EventSender,
    base_dir: Option<PathBuf>,
}

impl AssetLoader {
    pub fn new(sender: EventSender, base_dir: Option<PathBuf>) -> Self {
        Self { sender, base_dir }
    }

    pub fn set_base_dir(&mut self, base_dir: Option<PathBuf>) {
        self.base_dir = base_dir;
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Swap the texture's url list and start reading the first url.
    ///
    /// Does nothing when `urls` equals the current list.
    pub fn request_texture(&self, scene: &mut SceneGraph, texture: TextureId, urls: Vec<String>) {
        let Some(entry) = scene.texture_mut(texture) else {
            log::warn!("Texture reload for unknown texture {}", texture);
            return;
        };
        if entry.urls == urls {
            return;
        }
        entry.urls = urls;
        let Some(url) = entry.urls.first().cloned() else {
            entry.state = TextureState::Ready;
            return;
        };
        entry.state = TextureState::Pending;

        let path = self.resolve(&url);
        let sender = self.sender.clone();
        log::debug!("Loading texture {} from {}", texture, path.display());
        thread::spawn(move || {
            let result = std::fs::read(&path)
                .map(|bytes| bytes.len())
                .map_err(|e| format!("{}: {}", path.display(), e));
            let message = HostMessage::TextureLoaded(TextureLoad {
                texture,
                url,
                result,
            });
            if sender.send(message).is_err() {
                log::debug!("Texture result dropped; scene already closed");
            }
        });
    }
}

/// Apply a finished load, ignoring results for urls that were replaced in
/// the meantime.
pub fn apply_texture_load(scene: &mut SceneGraph, load: TextureLoad) {
    let Some(texture) = scene.texture_mut(load.texture) else {
        return;
    };
    if texture.urls.first() != Some(&load.url) {
        log::debug!("Stale texture load for {}", load.url);
        return;
    }
    texture.state = match load.result {
        Ok(bytes) => {
            log::info!("Texture {} loaded ({} bytes)", load.url, bytes);
            TextureState::Loaded(bytes)
        }
        Err(e) => {
            log::warn!("Texture load failed: {}", e);
            TextureState::Failed(e)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MessageQueue;
    use std::time::Duration;

    fn wait_for_message(queue: &MessageQueue) -> Vec<HostMessage> {
        for _ in 0..200 {
            let messages = queue.drain();
            if !messages.is_empty() {
                return messages;
            }
            thread::sleep(Duration::from_millis(5));
        }
        Vec::new()
    }

    #[test]
    fn test_missing_file_reports_failure() {
        let queue = MessageQueue::new();
        let loader = AssetLoader::new(queue.sender(), None);
        let mut scene = SceneGraph::new();
        let texture = scene.add_texture(vec!["a.png".to_string()]);

        loader.request_texture(&mut scene, texture, vec!["/nonexistent/b.png".to_string()]);
        assert_eq!(scene.texture(texture).unwrap().state, TextureState::Pending);

        let messages = wait_for_message(&queue);
        assert_eq!(messages.len(), 1);
        let HostMessage::TextureLoaded(load) = messages[0].clone() else {
            panic!("expected texture message");
        };
        apply_texture_load(&mut scene, load);
        assert!(matches!(
            scene.texture(texture).unwrap().state,
            TextureState::Failed(_)
        ));
    }

    #[test]
    fn test_unchanged_urls_do_not_reload() {
        let queue = MessageQueue::new();
        let loader = AssetLoader::new(queue.sender(), None);
        let mut scene = SceneGraph::new();
        let texture = scene.add_texture(vec!["a.png".to_string()]);
        loader.request_texture(&mut scene, texture, vec!["a.png".to_string()]);
        assert_eq!(scene.texture(texture).unwrap().state, TextureState::Ready);
        thread::sleep(Duration::from_millis(20));
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_stale_result_ignored() {
        let mut scene = SceneGraph::new();
        let texture = scene.add_texture(vec!["new.png".to_string()]);
        apply_texture_load(
            &mut scene,
            TextureLoad {
                texture,
                url: "old.png".to_string(),
                result: Ok(10),
            },
        );
        assert_eq!(scene.texture(texture).unwrap().state, TextureState::Ready);
    }
}
