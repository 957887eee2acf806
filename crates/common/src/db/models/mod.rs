//! SeaORM entity models
//!
//! Database entities for the ScholarFeed ranking surface

mod bounty;
mod comment;
mod feed_entry;
mod feed_entry_hub;
mod hub;
mod paper;
mod post;
mod user_hub_follow;

pub use feed_entry::{
    Entity as FeedEntryEntity,
    Model as FeedEntry,
    ActiveModel as FeedEntryActiveModel,
    Column as FeedEntryColumn,
    Relation as FeedEntryRelation,
    ContentKind,
    FeedAction,
};

pub use feed_entry_hub::{
    Entity as FeedEntryHubEntity,
    Model as FeedEntryHub,
    ActiveModel as FeedEntryHubActiveModel,
    Column as FeedEntryHubColumn,
};

pub use hub::{
    Entity as HubEntity,
    Model as Hub,
    ActiveModel as HubActiveModel,
    Column as HubColumn,
};

pub use user_hub_follow::{
    Entity as UserHubFollowEntity,
    Model as UserHubFollow,
    ActiveModel as UserHubFollowActiveModel,
    Column as UserHubFollowColumn,
};

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use post::{
    Entity as PostEntity,
    Model as Post,
    ActiveModel as PostActiveModel,
    Column as PostColumn,
};

pub use comment::{
    Entity as CommentEntity,
    Model as Comment,
    ActiveModel as CommentActiveModel,
    Column as CommentColumn,
};

pub use bounty::{
    Entity as BountyEntity,
    Model as Bounty,
    ActiveModel as BountyActiveModel,
    Column as BountyColumn,
};
