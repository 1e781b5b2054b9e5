//! Category labels recognised in archive metric fragments.

/// Scanned in order; the first keyword contained in a fragment wins, so a
/// shorter keyword listed earlier shadows a longer one that contains it.
pub static CATEGORY_KEYWORDS: &[&str] = &[
    "明星", "社会", "娱乐", "体育", "科技", "游戏", "美食", "财经", "时尚", "教育",
    "健康", "旅游", "汽车", "动漫", "军事", "数码", "音乐", "电影", "电视剧", "综艺",
    "搞笑", "情感", "生活", "家居", "育儿", "宠物", "摄影", "绘画", "读书", "写作",
    "职场", "法律", "政治", "历史", "文化", "艺术", "科学", "自然", "环保", "公益",
    "宗教", "心理", "星座", "彩票", "股票", "房产", "创业", "互联网", "手机", "电脑",
    "软件", "网络", "电商", "直播", "网红", "美妆", "服饰", "鞋包", "珠宝", "手表",
    "家具", "家电", "厨具", "食品", "饮料", "酒水", "烟草", "药品", "医疗", "医院",
    "学校", "教育机构", "公司", "工厂", "农村", "城市", "交通", "航空", "铁路", "公路",
    "海运", "天气", "地震", "台风", "洪水", "火灾", "事故", "犯罪", "警察", "法院",
    "监狱", "死亡", "出生", "结婚", "离婚", "恋爱", "分手", "求婚", "婚礼", "生日",
    "节日", "春节", "中秋", "端午", "清明", "国庆", "元旦", "圣诞",
];

pub fn classify(fragment: &str) -> Option<&'static str> {
    CATEGORY_KEYWORDS.iter().copied().find(|k| fragment.contains(k))
}
