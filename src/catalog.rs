// Static reference data for the portal: career paths used for fit scoring and
// fallback recommendations, plus the subject / education level seed rows.

use crate::assessment::{CognitiveArea, Trait};

pub struct CareerPath {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],  // matched against technical interests
    pub cognitive: &'static [CognitiveArea],
    pub traits: &'static [Trait],
    pub milestones: &'static [&'static str], // roadmap steps, in order
}

pub const CAREER_PATHS: &[CareerPath] = &[
    CareerPath {
        id: "data-scientist",
        title: "Data Scientist",
        description: "Turns raw data into insight with statistics and machine learning.",
        keywords: &["data", "machine learning", "statistics", "analysis", "python"],
        cognitive: &[CognitiveArea::Analytical, CognitiveArea::Logical],
        traits: &[Trait::Openness, Trait::Conscientiousness],
        milestones: &[
            "Master descriptive statistics and probability",
            "Learn Python with pandas and NumPy",
            "Build three end-to-end analysis projects",
            "Study supervised and unsupervised models",
            "Publish a portfolio with a capstone project",
        ],
    },
    CareerPath {
        id: "software-engineer",
        title: "Software Engineer",
        description: "Designs, builds and maintains reliable software systems.",
        keywords: &["programming", "software", "coding", "web", "apps"],
        cognitive: &[CognitiveArea::Logical, CognitiveArea::Analytical],
        traits: &[Trait::Conscientiousness],
        milestones: &[
            "Learn one language deeply",
            "Understand version control and testing",
            "Ship a small web application",
            "Study data structures and algorithms",
            "Contribute to an open-source project",
        ],
    },
    CareerPath {
        id: "ux-designer",
        title: "UX Designer",
        description: "Shapes how people experience products through research and design.",
        keywords: &["design", "ux", "ui", "art", "user experience"],
        cognitive: &[CognitiveArea::Spatial, CognitiveArea::Verbal],
        traits: &[Trait::Openness, Trait::Agreeableness],
        milestones: &[
            "Learn design fundamentals and typography",
            "Practice user interviews",
            "Prototype in a design tool",
            "Run a usability test",
            "Assemble a case-study portfolio",
        ],
    },
    CareerPath {
        id: "cybersecurity-analyst",
        title: "Cybersecurity Analyst",
        description: "Protects systems and networks from attack.",
        keywords: &["security", "hacking", "networks", "cyber", "privacy"],
        cognitive: &[CognitiveArea::Analytical, CognitiveArea::Logical],
        traits: &[Trait::Conscientiousness],
        milestones: &[
            "Learn networking fundamentals",
            "Study operating system internals",
            "Practice on capture-the-flag challenges",
            "Earn an entry-level security certification",
            "Complete a supervised security assessment",
        ],
    },
    CareerPath {
        id: "educator",
        title: "Educator",
        description: "Helps others learn as a teacher, tutor or instructional designer.",
        keywords: &["teaching", "education", "tutoring", "mentoring", "writing"],
        cognitive: &[CognitiveArea::Verbal],
        traits: &[Trait::Extraversion, Trait::Agreeableness],
        milestones: &[
            "Tutor a peer in your strongest subject",
            "Study how people learn",
            "Design a short lesson plan",
            "Deliver a workshop",
            "Gather feedback and iterate",
        ],
    },
    CareerPath {
        id: "research-scientist",
        title: "Research Scientist",
        description: "Advances knowledge through experiments and publication.",
        keywords: &["research", "science", "physics", "biology", "chemistry"],
        cognitive: &[CognitiveArea::Analytical, CognitiveArea::Verbal],
        traits: &[Trait::Openness],
        milestones: &[
            "Strengthen mathematics foundations",
            "Read and summarise recent papers",
            "Join a research project",
            "Design and run an experiment",
            "Write up results for publication",
        ],
    },
    CareerPath {
        id: "product-manager",
        title: "Product Manager",
        description: "Decides what gets built and why, working across teams.",
        keywords: &["product", "business", "startup", "management", "strategy"],
        cognitive: &[CognitiveArea::Verbal, CognitiveArea::Analytical],
        traits: &[Trait::Extraversion, Trait::Conscientiousness],
        milestones: &[
            "Learn product discovery techniques",
            "Write a product requirements document",
            "Run a prioritisation exercise with a team",
            "Define and track success metrics",
            "Lead a small launch",
        ],
    },
];

pub fn find_career(id: &str) -> Option<&'static CareerPath> {
    CAREER_PATHS.iter().find(|c| c.id == id)
}

// ============ Seed Data ============

pub struct SubjectSeed {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub topics: &'static [&'static str],
}

pub const SUBJECTS: &[SubjectSeed] = &[
    SubjectSeed {
        id: "mathematics",
        name: "Mathematics",
        description: "Numbers, algebra, geometry and statistics.",
        topics: &["Algebra", "Linear Equations", "Geometry", "Statistics", "Calculus"],
    },
    SubjectSeed {
        id: "physics",
        name: "Physics",
        description: "Matter, energy and the laws that govern them.",
        topics: &["Mechanics", "Electricity", "Waves", "Thermodynamics"],
    },
    SubjectSeed {
        id: "computer-science",
        name: "Computer Science",
        description: "Programming, algorithms and computing systems.",
        topics: &["Programming Basics", "Algorithms", "Data Structures", "Networks"],
    },
    SubjectSeed {
        id: "english",
        name: "English Language",
        description: "Reading, writing and communication.",
        topics: &["Comprehension", "Essay Writing", "Grammar"],
    },
    SubjectSeed {
        id: "biology",
        name: "Biology",
        description: "Living organisms and how they work.",
        topics: &["Cells", "Genetics", "Ecology", "Human Biology"],
    },
];

pub const EDUCATION_LEVELS: &[(&str, &str, i64)] = &[
    ("primary", "Primary", 1),
    ("o-level", "O-Level", 2),
    ("a-level", "A-Level", 3),
    ("undergraduate", "Undergraduate", 4),
    ("postgraduate", "Postgraduate", 5),
    ("professional", "Professional", 6),
];
