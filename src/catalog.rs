//! Canned answers for a fixed set of known questions
//!
//! Matching is whole-string equality after lower-casing both sides; a question
//! embedded in a longer utterance does not match.

struct CatalogEntry {
    question: &'static str,
    answer: &'static str,
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        question: "Give me itinerary for a day trip in Shenzhen?",
        answer: "Let me help you plan a perfect day in Shenzhen! 🌟\n• 9AM: Window of the World - iconic miniature landmarks\n• 12PM: OCT Harbour - waterfront dining\n• 2PM: OCT Loft - art galleries & cafes\n• 4:30PM: Dongmen Street - local shopping\n• 7PM: Dinner at Xiangmihu Seafood Street\n• 9PM: Civic Center light show\nWould you like directions or more details about any of these spots? Happy to help! 😊",
    },
    CatalogEntry {
        question: "are there any travel restrictions for entering China?",
        answer: "Thank you for asking about China travel requirements. As of November 2024, here's what you'll need to enter China:\nA valid passport with at least 6 months validity\n2 blank passport pages\nTourist visa (required)\nMaximum RMB 20,000 for entry/exit\nWe recommend consulting a travel clinic for necessary vaccinations\nIs there anything else you'd like to know about traveling to China? I'm happy to help!",
    },
    CatalogEntry {
        question: "How to go from HKIA to the Macau Ferry Pier?",
        answer: "Let me help you with directions from Hong Kong Airport to the Macau Ferry Pier! Here are your best options:\n🚌 A11 Bus:\nDirect route to Macau Ferry (5th stop)\nTravel time: ~45 minutes\nCost: HKD 40\n🚈 MTR:\nAirport Express to Hong Kong Station\nTransfer to Sheung Wan Station\nShort walk to ferry pier\nTravel time: ~50 minutes\n🚕 Taxi/Uber:\nDirect door-to-door service\nTravel time: 30-40 minutes\nCost: Around HKD 300-350\nWhich option would you like to know more about? I'm here to help with any questions! 😊",
    },
    CatalogEntry {
        question: "What's the weather forecast for Shenzhen on my arrival date?",
        answer: "Let me check the weather for your Shenzhen arrival on November 16, 2024! 🌤️\nThe forecast shows:\n • Temperature: 20-25°C (68-77°F)\n • Conditions: Mild with occasional showers\n • Tip: Don't forget to pack a light rain jacket or umbrella!\nWould you like me to check the weather for any other days during your stay? I'm happy to help! 😊",
    },
    CatalogEntry {
        question: "Can you suggest some cheap eats options near the Shenzhen Futian Port?",
        answer: "Here are some budget-friendly dining spots near Futian Port! 🍜\n• Shang Mian Jie - famous noodles & dumplings\n• Lao Cheng Gen - Sichuan cuisine with set meals\n• Huaqiang North Street Food - local snacks under ¥30\nMost meals at these places are under ¥50. Would you like specific directions to any of these spots? 😊",
    },
];

/// Look up the canned answer for a question
pub fn lookup(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    ENTRIES
        .iter()
        .find(|entry| entry.question.to_lowercase() == lower)
        .map(|entry| entry.answer)
}

/// All catalog questions, in declaration order
#[cfg(test)]
pub fn questions() -> impl Iterator<Item = &'static str> {
    ENTRIES.iter().map(|entry| entry.question)
}
