use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Highest total a single judge can award.
pub const TOTAL_POINTS: u32 = 100;

/// The seven scored categories of a role play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Understanding,
    Alternatives,
    Solution,
    Knowledge,
    Organization,
    Delivery,
    Questions,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Understanding,
        Category::Alternatives,
        Category::Solution,
        Category::Knowledge,
        Category::Organization,
        Category::Delivery,
        Category::Questions,
    ];

    /// The key used for this category in model output and reports.
    pub fn key(self) -> &'static str {
        match self {
            Category::Understanding => "understanding",
            Category::Alternatives => "alternatives",
            Category::Solution => "solution",
            Category::Knowledge => "knowledge",
            Category::Organization => "organization",
            Category::Delivery => "delivery",
            Category::Questions => "questions",
        }
    }

    pub fn max_points(self) -> u32 {
        self.criterion().max_points
    }

    pub fn criterion(self) -> &'static Criterion {
        &RUBRIC[self.index()]
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub range: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    pub category: Category,
    pub name: &'static str,
    pub max_points: u32,
    pub levels: [Level; 4],
}

const fn level(range: &'static str, description: &'static str) -> Level {
    Level { range, description }
}

pub static RUBRIC: [Criterion; 7] = [
    Criterion {
        category: Category::Understanding,
        name: "Understanding of Role Play & Problem Definition",
        max_points: 10,
        levels: [
            level("0", "No description or role play synopsis provided; no problems defined"),
            level("1-6", "Describes and provides role play synopsis OR defines the problem(s)"),
            level("7-8", "Describes and provides role play synopsis AND defines the problem(s)"),
            level("9-10", "Demonstrates expertise of role play synopsis and problem definition"),
        ],
    },
    Criterion {
        category: Category::Alternatives,
        name: "Alternatives & Pros/Cons Analysis",
        max_points: 20,
        levels: [
            level("0", "No alternatives identified"),
            level("1-9", "Alternatives given but pros and/or cons not analyzed"),
            level("10-16", "At least two alternatives with pros and cons analyzed"),
            level("17-20", "Multiple alternatives with multiple pros and cons analyzed for each"),
        ],
    },
    Criterion {
        category: Category::Solution,
        name: "Solution & Implementation",
        max_points: 20,
        levels: [
            level("0", "No solution identified"),
            level("1-9", "Solution provided, but implementation plan not developed"),
            level("10-16", "Logical solution and implementation plan provided"),
            level(
                "17-20",
                "Feasible solution and implementation plan developed; necessary resources identified",
            ),
        ],
    },
    Criterion {
        category: Category::Knowledge,
        name: "Knowledge Area Application",
        max_points: 20,
        levels: [
            level("0", "No knowledge areas demonstrated"),
            level("1-9", "One or two knowledge areas demonstrated"),
            level("10-16", "Three knowledge areas demonstrated"),
            level("17-20", "Four or more knowledge areas demonstrated"),
        ],
    },
    Criterion {
        category: Category::Organization,
        name: "Organization & Clarity",
        max_points: 10,
        levels: [
            level("0", "Competitor(s) did not appear prepared"),
            level("1-6", "Prepared, but flow not logical"),
            level("7-8", "Logical sequence"),
            level("9-10", "Logical sequence; statements well organized"),
        ],
    },
    Criterion {
        category: Category::Delivery,
        name: "Delivery Skills",
        max_points: 10,
        levels: [
            level(
                "0",
                "Did not demonstrate confidence, body language, eye contact, or voice projection",
            ),
            level("1-6", "Demonstrated 1-2 skills"),
            level("7-8", "Demonstrated 3 skills"),
            level("9-10", "Demonstrated all skills, enhancing presentation"),
        ],
    },
    Criterion {
        category: Category::Questions,
        name: "Question Handling",
        max_points: 10,
        levels: [
            level("0", "Unable to answer questions"),
            level("1-6", "Does not completely answer questions"),
            level("7-8", "Completely answers questions"),
            level("9-10", "Interacts with judges while answering questions"),
        ],
    },
];

/// Per-category points, each kept within its category maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryScores([u32; 7]);

impl CategoryScores {
    pub fn uniform(points: u32) -> Self {
        let mut scores = Self::default();
        for category in Category::ALL {
            scores.set(category, points);
        }
        scores
    }

    pub fn get(&self, category: Category) -> u32 {
        self.0[category.index()]
    }

    /// Stores `points`, clamped to the category maximum.
    pub fn set(&mut self, category: Category, points: u32) {
        self.0[category.index()] = points.min(category.max_points());
    }

    pub fn sum(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, u32)> + '_ {
        Category::ALL.into_iter().map(|c| (c, self.get(c)))
    }
}

impl Serialize for CategoryScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for (category, points) in self.iter() {
            map.serialize_entry(category.key(), &points)?;
        }
        map.end()
    }
}

/// The rubric rendered for inclusion in a judging prompt.
pub fn rubric_prompt() -> String {
    let mut out = format!("RUBRIC (Max {TOTAL_POINTS}):\n");
    for criterion in &RUBRIC {
        out.push_str(&format!(
            "- {} [{}] (max {}):\n",
            criterion.name,
            criterion.category.key(),
            criterion.max_points
        ));
        for level in &criterion.levels {
            out.push_str(&format!("    {}: {}\n", level.range, level.description));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_maxima_sum_to_one_hundred() {
        let total: u32 = Category::ALL.iter().map(|c| c.max_points()).sum();
        assert_eq!(total, TOTAL_POINTS);
        for (i, criterion) in RUBRIC.iter().enumerate() {
            assert_eq!(criterion.category, Category::ALL[i]);
        }
    }

    #[test]
    fn scores_are_clamped_to_their_category() {
        let mut scores = CategoryScores::default();
        scores.set(Category::Understanding, 15);
        scores.set(Category::Alternatives, 15);
        assert_eq!(scores.get(Category::Understanding), 10);
        assert_eq!(scores.get(Category::Alternatives), 15);
        assert_eq!(scores.sum(), 25);
    }

    #[test]
    fn scores_serialize_as_a_keyed_map() {
        let json = serde_json::to_value(CategoryScores::uniform(5)).unwrap();
        assert_eq!(json["understanding"], 5);
        assert_eq!(json["questions"], 5);
        assert_eq!(json.as_object().unwrap().len(), 7);
    }

    #[test]
    fn prompt_lists_every_level() {
        let prompt = rubric_prompt();
        assert!(prompt.starts_with("RUBRIC (Max 100):"));
        assert!(prompt.contains("Alternatives & Pros/Cons Analysis [alternatives] (max 20)"));
        assert!(prompt.contains("9-10: Interacts with judges while answering questions"));
    }
}
