//! Data models
//!
//! Database entities (User, PersonalAccessToken, Category, Document, Course,
//! News, Test), the inputs used to write them and the shared pagination types.

mod category;
mod course;
mod document;
mod news;
mod pagination;
mod test;
mod token;
mod user;

pub use category::{Category, CategoryKind, CreateCategoryInput, UpdateCategoryInput};
pub use course::{Course, CourseFilter, CourseInput, CourseType};
pub use document::{CreateDocumentInput, Document, DocumentFilter, UpdateDocumentInput};
pub use news::{News, NewsFilter, NewsInput};
pub use pagination::{ListParams, PagedResult};
pub use self::test::{Question, QuestionPayload, QuestionType, Test, TestFilter, TestInput};
pub use token::PersonalAccessToken;
pub use user::{CreateUserInput, UpdateUserInput, User, UserRole};
