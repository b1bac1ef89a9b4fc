//! Admin dashboard statistics

use crate::db::repositories::{CourseTotals, DocumentTotals, NewsTotals};
use crate::services::content::ContentServiceError;
use crate::services::{CourseService, DocumentService, NewsService, TestService, UserService};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct TestTotals {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTotals {
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub documents: DocumentTotals,
    pub courses: CourseTotals,
    pub news: NewsTotals,
    pub tests: TestTotals,
    pub users: UserTotals,
}

pub struct DashboardService {
    documents: Arc<DocumentService>,
    courses: Arc<CourseService>,
    news: Arc<NewsService>,
    tests: Arc<TestService>,
    users: Arc<UserService>,
}

impl DashboardService {
    pub fn new(
        documents: Arc<DocumentService>,
        courses: Arc<CourseService>,
        news: Arc<NewsService>,
        tests: Arc<TestService>,
        users: Arc<UserService>,
    ) -> Self {
        Self {
            documents,
            courses,
            news,
            tests,
            users,
        }
    }

    pub async fn stats(&self) -> Result<DashboardStats, ContentServiceError> {
        let (documents, courses, news, tests) = tokio::try_join!(
            self.documents.totals(),
            self.courses.totals(),
            self.news.totals(),
            self.tests.counts(),
        )?;
        let users = self
            .users
            .count()
            .await
            .map_err(|e| ContentServiceError::InternalError(anyhow::anyhow!("Failed to count users: {}", e)))?;

        Ok(DashboardStats {
            documents,
            courses,
            news,
            tests: TestTotals {
                total: tests.0,
                active: tests.1,
            },
            users: UserTotals { total: users },
        })
    }
}
