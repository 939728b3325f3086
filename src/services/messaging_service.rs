// src/services/messaging_service.rs
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing;
use uuid::Uuid;

use crate::{
    models::messages::{NewNotification, Notification, ReadFilter},
    utils::{
        clock::Clock,
        id_generator::{IdGenerator, IdType},
    },
};

/// Observer invoked with the full notification list after every change.
pub type NotificationCallback = Arc<dyn Fn(&[Notification]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

/// Central mailbox. Every user-facing event in the core goes through here.
///
/// None of these operations fail: an unknown id on mark-as-read or an
/// unknown subscription on unsubscribe is a silent no-op.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn add_notification(&self, notification: NewNotification) -> Notification;
    async fn subscribe(&self, callback: NotificationCallback) -> SubscriptionId;
    async fn unsubscribe(&self, subscription: SubscriptionId);
    async fn get_notifications(&self, user_id: &str, filter: ReadFilter) -> Vec<Notification>;
    async fn get_unread_count(&self, user_id: &str) -> usize;
    async fn mark_as_read(&self, notification_id: &str);
    async fn mark_all_as_read(&self, user_id: &str);
    async fn all_notifications(&self) -> Vec<Notification>;
}

pub struct NotificationStore {
    clock: Arc<dyn Clock>,
    notifications: RwLock<Vec<Notification>>,
    subscribers: RwLock<Vec<(SubscriptionId, NotificationCallback)>>,
}

impl NotificationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            notifications: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Hand every subscriber a snapshot. Called with no lock held so a
    /// callback may query the store again.
    async fn publish(&self) {
        let callbacks: Vec<NotificationCallback> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        if callbacks.is_empty() {
            return;
        }

        let snapshot = self.notifications.read().await.clone();
        for callback in callbacks {
            callback(&snapshot);
        }
    }
}

#[async_trait]
impl NotificationService for NotificationStore {
    async fn add_notification(&self, notification: NewNotification) -> Notification {
        let timestamp = self.clock.now();
        let created = Notification {
            id: IdGenerator::generate_with_timestamp(IdType::Notification, timestamp),
            user_id: notification.user_id,
            notification_type: notification.notification_type,
            title: notification.title,
            message: notification.message,
            timestamp,
            read: false,
            action_url: notification.action_url,
            data: notification.data,
        };

        tracing::info!(
            "Notification {} ({}) -> {}: {}",
            created.id,
            created.notification_type,
            created.user_id,
            created.title
        );

        self.notifications.write().await.push(created.clone());
        self.publish().await;

        created
    }

    async fn subscribe(&self, callback: NotificationCallback) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers.write().await.push((id, callback));
        tracing::debug!("Notification subscriber added: {:?}", id);
        id
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != subscription);

        if subscribers.len() == before {
            tracing::debug!("Unsubscribe for unknown subscription {:?} ignored", subscription);
        }
    }

    async fn get_notifications(&self, user_id: &str, filter: ReadFilter) -> Vec<Notification> {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id && filter.matches(n))
            .cloned()
            .collect()
    }

    async fn get_unread_count(&self, user_id: &str) -> usize {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count()
    }

    async fn mark_as_read(&self, notification_id: &str) {
        let changed = {
            let mut notifications = self.notifications.write().await;
            match notifications.iter_mut().find(|n| n.id == notification_id) {
                Some(n) if !n.read => {
                    n.read = true;
                    true
                }
                Some(_) => false,
                None => {
                    tracing::debug!("mark_as_read: unknown notification {}", notification_id);
                    false
                }
            }
        };

        if changed {
            self.publish().await;
        }
    }

    async fn mark_all_as_read(&self, user_id: &str) {
        let changed = {
            let mut notifications = self.notifications.write().await;
            let mut changed = 0usize;
            for n in notifications
                .iter_mut()
                .filter(|n| n.user_id == user_id && !n.read)
            {
                n.read = true;
                changed += 1;
            }
            changed
        };

        tracing::debug!("Marked {} notifications read for {}", changed, user_id);

        if changed > 0 {
            self.publish().await;
        }
    }

    async fn all_notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}
