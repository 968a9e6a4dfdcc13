//! Store key layout shared by the workflow and the store-backed subsystems.

pub const GLOBAL: &str = "global";
pub const NEXT_PID: &str = "nextPid";
pub const POST_COUNT: &str = "postCount";
/// Every post id, scored by creation time.
pub const POSTS_BY_TIME: &str = "posts:pid";

pub fn post(pid: u64) -> String {
    format!("post:{pid}")
}

pub fn post_replies(pid: u64) -> String {
    format!("pid:{pid}:replies")
}

pub fn post_uploads(pid: u64) -> String {
    format!("post:{pid}:uploads")
}

pub fn upload_pids(path_hash: &str) -> String {
    format!("upload:{path_hash}:pids")
}

pub fn topic(tid: u64) -> String {
    format!("topic:{tid}")
}

pub fn topic_posts(tid: u64) -> String {
    format!("tid:{tid}:posts")
}

pub fn user(uid: u64) -> String {
    format!("user:{uid}")
}

pub fn user_posts(uid: u64) -> String {
    format!("uid:{uid}:posts")
}

pub fn user_groups(uid: u64) -> String {
    format!("uid:{uid}:groups")
}

pub fn category(cid: u64) -> String {
    format!("category:{cid}")
}

pub fn category_pids(cid: u64) -> String {
    format!("cid:{cid}:pids")
}

pub fn category_tids(cid: u64) -> String {
    format!("cid:{cid}:tids")
}

pub fn category_recent_tids(cid: u64) -> String {
    format!("cid:{cid}:recent_tids")
}

pub fn group_member_pids(name: &str) -> String {
    format!("group:{name}:member:pids")
}
