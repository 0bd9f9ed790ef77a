//! Built-in sample corpus, uploaded when `upload` is given no paths.

use crate::rag::Document;

const SAMPLES: [(&str, &str, &str, &str); 5] = [
    (
        "legus-food-1",
        "Legus Favorite Foods",
        "Personal Preferences",
        "Legus absolutely loves Italian cuisine, especially authentic pasta dishes. His favorite pasta is carbonara with perfectly cooked spaghetti, crispy pancetta, and a rich egg-based sauce. He also enjoys homemade pizza with fresh mozzarella and basil.\n\nWhen it comes to desserts, Legus has a sweet tooth for tiramisu and gelato. He particularly enjoys pistachio and stracciatella flavors. For breakfast, he prefers a hearty English breakfast with eggs, bacon, and toast.\n\nLegus also enjoys experimenting with different cuisines. He recently discovered a love for Japanese ramen and Korean barbecue. His go-to comfort food is his grandmother's chicken soup recipe.",
    ),
    (
        "legus-activities-1",
        "Legus Favorite Activities",
        "Personal Interests",
        "Legus is passionate about outdoor activities and adventure sports. His favorite hobby is rock climbing, which he does both indoors and outdoors. He has climbed several challenging routes in the local mountains and dreams of climbing El Capitan in Yosemite.\n\nWhen he's not climbing, Legus enjoys hiking and camping. He has completed several multi-day backpacking trips and loves exploring national parks. Photography is another passion of his, especially landscape and wildlife photography during his outdoor adventures.\n\nLegus also enjoys playing guitar and has been learning for over five years. He particularly likes playing acoustic folk and rock music. He's part of a local music group that meets weekly to jam and perform at small venues.",
    ),
    (
        "legus-tech-1",
        "Legus Technology Interests",
        "Professional Profile",
        "Legus is deeply interested in artificial intelligence and machine learning. He has been working on several projects involving natural language processing and computer vision. His current focus is on building RAG (Retrieval-Augmented Generation) systems for document processing.\n\nHe is proficient in Python, JavaScript, and has experience with cloud platforms like AWS and Azure. Legus enjoys building web applications and has created several full-stack projects using React and Node.js. He's particularly interested in the intersection of AI and web development.\n\nLegus is always learning new technologies and recently started exploring Rust for systems programming. He believes in the importance of clean code and follows best practices in software development. He's also interested in DevOps and has experience with Docker and Kubernetes.",
    ),
    (
        "legus-travel-1",
        "Legus Travel Experiences",
        "Personal Stories",
        "Legus loves to travel and has visited over 15 countries. His most memorable trip was to Japan, where he spent three weeks exploring Tokyo, Kyoto, and the Japanese Alps. He was fascinated by the blend of traditional culture and modern technology.\n\nAnother favorite destination is Iceland, where he went on a two-week road trip around the Ring Road. He was amazed by the dramatic landscapes, from glaciers to geysers, and the Northern Lights. He also enjoyed the local cuisine, especially the fresh seafood and lamb dishes.\n\nLegus prefers immersive travel experiences over touristy attractions. He likes staying in local accommodations, trying authentic food, and learning basic phrases in the local language. His next planned trip is to Patagonia for hiking and wildlife photography.",
    ),
    (
        "legus-goals-1",
        "Legus Future Goals",
        "Personal Aspirations",
        "Legus has ambitious goals for his career in technology. He wants to become a senior AI engineer and eventually start his own tech company focused on making AI more accessible to small businesses. He's particularly interested in developing tools that help non-technical users leverage AI capabilities.\n\nOn a personal level, Legus wants to complete a thru-hike of the Pacific Crest Trail, which would take about five months. He's also planning to learn Spanish fluently and hopes to spend time living in South America to immerse himself in the language and culture.\n\nLegus believes in continuous learning and personal growth. He's committed to reading at least one book per month and attending tech conferences to stay updated with industry trends. He also wants to mentor other developers and contribute to open-source projects.",
    ),
];

/// The five sample documents about Legus.
pub fn sample_documents() -> Vec<Document> {
    SAMPLES
        .iter()
        .map(|(id, title, source, text)| {
            Document::new(*id, *text)
                .with_title(*title)
                .with_source(*source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_documents() {
        let documents = sample_documents();
        assert_eq!(documents.len(), 5);
        assert_eq!(documents[0].id, "legus-food-1");
        assert_eq!(documents[0].title, "Legus Favorite Foods");
        assert!(documents.iter().all(|d| !d.text.trim().is_empty()));
    }
}
