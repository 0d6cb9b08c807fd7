use chrono::{Duration, Utc};
use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::database::models::{LogFilter, LoginLog, NewLoginLog, NewOperationLog, OperationLog};
use crate::database::Store;
use crate::types::{Page, PageRequest};

/// Operation and login trail. Recording never fails the caller: storage
/// errors are logged and swallowed.
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn Store>,
    enabled: bool,
}

impl AuditService {
    pub fn new(store: Arc<dyn Store>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    pub async fn record_operation(&self, log: NewOperationLog) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.store.insert_operation_log(log).await {
            tracing::warn!(error = %e, "failed to record operation log");
        }
    }

    pub async fn record_login(&self, log: NewLoginLog) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.store.insert_login_log(log).await {
            tracing::warn!(error = %e, "failed to record login log");
        }
    }

    pub async fn page_operations(&self, filter: &LogFilter, page: PageRequest) -> ServiceResult<Page<OperationLog>> {
        let (items, total) = self.store.page_operation_logs(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    pub async fn page_logins(&self, filter: &LogFilter, page: PageRequest) -> ServiceResult<Page<LoginLog>> {
        let (items, total) = self.store.page_login_logs(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    /// Drop entries of both kinds older than `days`
    pub async fn purge_older_than(&self, days: u32) -> ServiceResult<u64> {
        if days == 0 {
            return Err(ServiceError::validation("retention must be at least one day"));
        }
        let cutoff = Utc::now()
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| ServiceError::validation(format!("retention of {} days is out of range", days)))?;
        let removed = self.store.purge_logs_before(cutoff).await?;
        tracing::info!(days, removed, %cutoff, "purged audit logs");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::LoginOutcome;
    use crate::database::MemoryStore;

    fn operation(username: &str, module: &str) -> NewOperationLog {
        NewOperationLog {
            user_id: Some(1),
            username: username.into(),
            module: module.into(),
            action: "POST".into(),
            method: "POST".into(),
            path: format!("/api/v1/{}", module),
            status_code: 200,
            duration_ms: 3,
            client_ip: "127.0.0.1".into(),
            user_agent: "test".into(),
        }
    }

    #[tokio::test]
    async fn records_and_filters_operations() {
        let audit = AuditService::new(Arc::new(MemoryStore::new()), true);
        audit.record_operation(operation("admin", "assets")).await;
        audit.record_operation(operation("admin", "users")).await;
        audit.record_operation(operation("bob", "assets")).await;

        let filter = LogFilter {
            module: Some("assets".into()),
            ..Default::default()
        };
        let page = audit.page_operations(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn disabled_audit_records_nothing() {
        let audit = AuditService::new(Arc::new(MemoryStore::new()), false);
        audit
            .record_login(NewLoginLog {
                username: "admin".into(),
                user_id: None,
                outcome: LoginOutcome::Failure,
                message: "bad password".into(),
                client_ip: String::new(),
                user_agent: String::new(),
            })
            .await;
        let page = audit.page_logins(&LogFilter::default(), PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn purge_keeps_recent_entries() {
        let audit = AuditService::new(Arc::new(MemoryStore::new()), true);
        audit.record_operation(operation("admin", "assets")).await;

        assert!(matches!(audit.purge_older_than(0).await, Err(ServiceError::Validation(_))));
        assert!(matches!(audit.purge_older_than(u32::MAX).await, Err(ServiceError::Validation(_))));
        assert_eq!(audit.purge_older_than(30).await.unwrap(), 0);
        let page = audit.page_operations(&LogFilter::default(), PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }
}
