use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

/// A simulated competition judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Judge {
    pub id: u8,
    pub name: &'static str,
    pub title: &'static str,
    pub background: &'static str,
    pub style: &'static str,
    /// One-line personality instruction used in the judge's prompt.
    #[serde(skip)]
    pub voice: &'static str,
}

pub static JUDGE_POOL: [Judge; 10] = [
    Judge {
        id: 1,
        name: "Dr. Margaret Chen",
        title: "Professor of International Business",
        background: "20 years teaching at Harvard Business School, former trade consultant",
        style: "Analytical and detail-oriented, focuses on theoretical foundations and practical applications",
        voice: "You are analytical and theory-focused.",
    },
    Judge {
        id: 2,
        name: "Marcus Williams",
        title: "Senior VP of Global Operations",
        background: "Fortune 500 executive with experience in 15+ countries",
        style: "Results-driven, values clear communication and actionable strategies",
        voice: "You are ROI-driven and direct.",
    },
    Judge {
        id: 3,
        name: "Dr. Yuki Tanaka",
        title: "Cross-Cultural Business Consultant",
        background: "Expert in East-West business relations and cultural intelligence",
        style: "Emphasizes cultural awareness and relationship building",
        voice: "You focus on cultural nuance and respect.",
    },
    Judge {
        id: 4,
        name: "Robert Martinez",
        title: "International Trade Attorney",
        background: "Partner at global law firm, specializes in trade compliance",
        style: "Precise and methodical, focuses on legal and regulatory aspects",
        voice: "You are legalistic and precise.",
    },
    Judge {
        id: 5,
        name: "Sarah O'Brien",
        title: "Entrepreneurship Director",
        background: "Founded three successful international ventures",
        style: "Creative and encouraging, values innovative thinking and risk assessment",
        voice: "You value innovation and creativity.",
    },
    Judge {
        id: 6,
        name: "Dr. Kwame Asante",
        title: "Emerging Markets Economist",
        background: "World Bank advisor, expert in developing economies",
        style: "Data-focused, emphasizes economic analysis and market understanding",
        voice: "You focus on economic data.",
    },
    Judge {
        id: 7,
        name: "Jennifer Park",
        title: "Supply Chain Director",
        background: "Managed global logistics for major retail chains",
        style: "Practical and process-oriented, values operational efficiency",
        voice: "You focus on operational logistics.",
    },
    Judge {
        id: 8,
        name: "David Thompson",
        title: "Business Education Specialist",
        background: "15 years as FBLA advisor, state-level competition coordinator",
        style: "Student-focused, balances encouragement with constructive criticism",
        voice: "You are a supportive educator.",
    },
    Judge {
        id: 9,
        name: "Dr. Aisha Patel",
        title: "Global Marketing Professor",
        background: "Authored textbooks on international marketing strategy",
        style: "Strategic thinker, emphasizes market positioning and branding",
        voice: "You focus on brand strategy.",
    },
    Judge {
        id: 10,
        name: "Michael Chang",
        title: "Venture Capitalist",
        background: "Invested in 50+ international startups",
        style: "Direct and pragmatic, focuses on scalability and market potential",
        voice: "You focus on scalability and profit.",
    },
];

/// Draws `count` distinct judges from the pool, capped at the pool size.
pub fn select_judges<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Judge> {
    JUDGE_POOL.choose_multiple(rng, count).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn selection_is_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let judges = select_judges(&mut rng, 3);
            assert_eq!(judges.len(), 3);
            let ids: HashSet<u8> = judges.iter().map(|j| j.id).collect();
            assert_eq!(ids.len(), 3);
        }
    }

    #[test]
    fn same_seed_same_panel() {
        let a = select_judges(&mut StdRng::seed_from_u64(42), 3);
        let b = select_judges(&mut StdRng::seed_from_u64(42), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn count_is_capped_by_the_pool() {
        let judges = select_judges(&mut StdRng::seed_from_u64(1), 25);
        assert_eq!(judges.len(), JUDGE_POOL.len());
    }
}
