pub(crate) mod daily_members;
pub use daily_members::{daily_members, DailyMembers};
pub(crate) mod hourly_revenue;
pub use hourly_revenue::{hourly_revenue, HourlyRevenue, HourlyRevenueStore};
pub(crate) mod member_order_interval;
pub use member_order_interval::{member_order_interval, MemberOrderInterval};
pub(crate) mod member_revenue_info;
pub use member_revenue_info::{age_at, AgeGroup, AgeGroups, MemberRevenueInfo};
pub(crate) mod product_group;
pub use product_group::{GroupLabels, ProductGroup};
pub(crate) mod product_sales;
pub use product_sales::{co_purchases, family_sales, Family, ProductSales};
pub(crate) mod region_revenue;
pub use region_revenue::{region_revenue, RegionRevenue};
pub(crate) mod revenue_overview;
pub use revenue_overview::{revenue_overview, RevenueOverview};
pub(crate) mod source_revenue;
pub use source_revenue::{source_revenue, SourceLabels, SourceRevenue};
pub(crate) mod store_revenue;
pub use store_revenue::{store_revenue, StoreRevenue};

pub const REVENUE_OVERVIEW: &str = "revenue_overview";
pub const REGION_REVENUE: &str = "region_revenue";
pub const SOURCE_REVENUE: &str = "source_revenue";
pub const STORE_REVENUE: &str = "store_revenue";
pub const HOURLY_REVENUE_STORE: &str = "hourly_revenue_store";
pub const HOURLY_REVENUE: &str = "hourly_revenue";
pub const MEMBER_REVENUE_INFO: &str = "member_revenue_info";
pub const MEMBER_ORDER_INTERVAL: &str = "member_order_interval";
pub const DAILY_MEMBERS: &str = "daily_members";
pub const PRODUCT_GROUP: &str = "product_group";
